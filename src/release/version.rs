//! Structural version comparison.
//!
//! winget publishes one manifest directory per released version; picking
//! the newest means ordering directory names like "1.9.9" and "1.10.0"
//! correctly, which plain string comparison gets wrong. [`VersionKey`]
//! splits a version string into numeric and alphabetic runs and compares
//! component-wise, numerically where both sides are numeric. This is not
//! semver — prerelease tags sort after their release — but it matches
//! how the manifests are laid out.

use std::cmp::Ordering;

/// One parsed run of a version string.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Component {
    Number(u64),
    Text(String),
}

impl Ord for Component {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Component::Number(a), Component::Number(b)) => a.cmp(b),
            (Component::Text(a), Component::Text(b)) => a.cmp(b),
            // Numbers sort before any alphabetic run.
            (Component::Number(_), Component::Text(_)) => Ordering::Less,
            (Component::Text(_), Component::Number(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Comparable key parsed from a version string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct VersionKey(Vec<Component>);

impl VersionKey {
    /// Parse a version string into its comparable components.
    ///
    /// Digit runs become numbers, letter runs become lowercase text,
    /// everything else separates components.
    pub fn parse(version: &str) -> Self {
        let mut components = Vec::new();
        let mut chars = version.chars().peekable();

        while let Some(&c) = chars.peek() {
            if c.is_ascii_digit() {
                let mut run = String::new();
                while let Some(&d) = chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    run.push(d);
                    chars.next();
                }
                match run.parse::<u64>() {
                    Ok(n) => components.push(Component::Number(n)),
                    // Absurdly long digit run: fall back to text.
                    Err(_) => components.push(Component::Text(run)),
                }
            } else if c.is_alphanumeric() {
                let mut run = String::new();
                while let Some(&d) = chars.peek() {
                    if !d.is_alphanumeric() || d.is_ascii_digit() {
                        break;
                    }
                    run.extend(d.to_lowercase());
                    chars.next();
                }
                components.push(Component::Text(run));
            } else {
                chars.next();
            }
        }

        VersionKey(components)
    }
}

/// Pick the maximum of an iterator of version strings by structural
/// comparison, returning the original string.
pub fn latest<'a>(versions: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    versions
        .into_iter()
        .max_by_key(|version| VersionKey::parse(version))
}
