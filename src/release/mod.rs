//! Upstream release resolution.
//!
//! Two sources provide "latest installer" metadata: the GitHub releases
//! API ([`github`]) and the winget package manifest repository
//! ([`winget`]). Both share the same contract: given a predicate over
//! the published assets, resolve and download the single matching asset
//! of the newest release. "Nothing matched" is a recoverable outcome
//! (`Ok(None)`) — the caller keeps using the bundled installer — while a
//! transport or format failure aborts the run.

pub mod github;
pub mod version;
pub mod winget;

pub use version::VersionKey;
