//! ---
//! cupang_section: "02-versioning"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Version comparison and build metadata helpers."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
#![warn(missing_docs)]

//! Version helpers shared across the workspace: a forgiving comparator for
//! the version strings release sources publish, and compile-time build
//! metadata for `--version` output and the HTTP user agent.

pub mod ordered;
pub mod semver;

pub use ordered::{OrderedVersion, VersionSource, FALLBACK_VERSION};
pub use semver::VersionInfo;
