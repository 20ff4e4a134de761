//! MozillaBuild packager library.
//!
//! Building blocks for assembling the MozillaBuild Windows development
//! environment: tool staging, alternate-root MSYS2 sync, binary
//! post-processing and NSIS installer packaging.

pub mod config;
pub mod download;
pub mod fsutil;
pub mod locate;
pub mod preflight;
pub mod process;
pub mod release;
pub mod stage;
