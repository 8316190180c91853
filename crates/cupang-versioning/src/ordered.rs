//! ---
//! cupang_section: "02-versioning"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Version comparison and build metadata helpers."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use once_cell::sync::Lazy;
use regex::Regex;

/// Literal used whenever a version string carries no usable digits.
///
/// Updaters rely on this being the lowest sensible value: an artifact whose
/// local version is unknown compares as outdated against any real release.
pub const FALLBACK_VERSION: &str = "1.0";

static DOTTED_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:\.\d+)*").expect("static version pattern compiles"));

/// How an [`OrderedVersion`] was derived from its raw input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSource {
    /// The input was a valid semantic version.
    Strict,
    /// A dotted run of digits was extracted from the input.
    Extracted,
    /// Nothing usable was found and [`FALLBACK_VERSION`] was used.
    Fallback,
}

/// A totally ordered version value built from a loosely formed string.
///
/// Only the numeric release segments take part in comparisons; pre-release
/// and build metadata are dropped, and trailing zero segments are ignored
/// (`1.2 == 1.2.0`).
#[derive(Debug, Clone)]
pub struct OrderedVersion {
    raw: String,
    segments: Vec<u64>,
    source: VersionSource,
}

impl OrderedVersion {
    /// Parse any version string, never failing.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let candidate = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);

        if let Ok(version) = ::semver::Version::parse(candidate) {
            return Self {
                raw: raw.to_owned(),
                segments: vec![version.major, version.minor, version.patch],
                source: VersionSource::Strict,
            };
        }

        if let Some(found) = DOTTED_DIGITS.find(trimmed) {
            let segments = found
                .as_str()
                .split('.')
                .map(|segment| segment.parse::<u64>().unwrap_or(u64::MAX))
                .collect();
            return Self {
                raw: raw.to_owned(),
                segments,
                source: VersionSource::Extracted,
            };
        }

        Self::fallback(raw)
    }

    /// The "unknown, always outdated" sentinel.
    pub fn fallback(raw: &str) -> Self {
        Self {
            raw: raw.to_owned(),
            segments: vec![1, 0],
            source: VersionSource::Fallback,
        }
    }

    /// The input the value was parsed from.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Numeric release segments, as parsed.
    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    /// How the value was derived.
    pub fn source(&self) -> VersionSource {
        self.source
    }

    fn significant(&self) -> &[u64] {
        let end = self
            .segments
            .iter()
            .rposition(|segment| *segment != 0)
            .map_or(0, |idx| idx + 1);
        &self.segments[..end]
    }
}

impl fmt::Display for OrderedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.segments.iter().map(u64::to_string).collect();
        f.write_str(&rendered.join("."))
    }
}

impl PartialEq for OrderedVersion {
    fn eq(&self, other: &Self) -> bool {
        self.significant() == other.significant()
    }
}

impl Eq for OrderedVersion {}

impl Hash for OrderedVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant().hash(state);
    }
}

impl PartialOrd for OrderedVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let left = self.significant();
        let right = other.significant();
        let len = left.len().max(right.len());
        for idx in 0..len {
            let a = left.get(idx).copied().unwrap_or(0);
            let b = right.get(idx).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl From<&str> for OrderedVersion {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_semver_drops_prerelease() {
        let version = OrderedVersion::parse("2.5.1-SNAPSHOT+build.7");
        assert_eq!(version.source(), VersionSource::Strict);
        assert_eq!(version.segments(), &[2, 5, 1]);
    }

    #[test]
    fn leading_v_is_accepted() {
        assert_eq!(OrderedVersion::parse("v1.20.4"), OrderedVersion::parse("1.20.4"));
    }

    #[test]
    fn digits_are_extracted_from_noise() {
        let version = OrderedVersion::parse("Geyser-Spigot build 2.2.3 (b512)");
        assert_eq!(version.source(), VersionSource::Extracted);
        assert_eq!(version.segments(), &[2, 2, 3]);
    }

    #[test]
    fn inputs_without_digits_equal_fallback() {
        for raw in ["", "latest", "release-candidate", "...", "v"] {
            let version = OrderedVersion::parse(raw);
            assert_eq!(version.source(), VersionSource::Fallback, "{raw:?}");
            assert_eq!(version, OrderedVersion::parse(FALLBACK_VERSION), "{raw:?}");
        }
    }

    #[test]
    fn trailing_zeros_do_not_matter() {
        assert_eq!(OrderedVersion::parse("1.2"), OrderedVersion::parse("1.2.0"));
        assert_eq!(OrderedVersion::parse("1"), OrderedVersion::parse("1.0.0.0"));
    }

    #[test]
    fn numeric_segments_compare_numerically() {
        assert!(OrderedVersion::parse("1.10") > OrderedVersion::parse("1.9"));
        assert!(OrderedVersion::parse("2.0") > OrderedVersion::parse("1.99.99"));
        assert!(OrderedVersion::parse("1.0.1") > OrderedVersion::parse("1"));
    }

    #[test]
    fn equal_versions_satisfy_greater_or_equal() {
        let local = OrderedVersion::parse("5.4.0");
        let remote = OrderedVersion::parse("5.4");
        assert!(local >= remote);
    }

    #[test]
    fn unknown_local_version_is_outdated() {
        let local = OrderedVersion::parse("unknown");
        assert!(local < OrderedVersion::parse("1.0.1"));
    }

    #[test]
    fn oversized_segments_saturate() {
        let version = OrderedVersion::parse("99999999999999999999999.1");
        assert_eq!(version.segments()[0], u64::MAX);
    }
}
