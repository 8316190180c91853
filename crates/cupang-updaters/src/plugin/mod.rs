//! ---
//! cupang_section: "08-release-sources"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Plugin updaters and their shared config readers."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
pub mod bukkit;
pub mod custom;
pub mod github;
pub mod jenkins;
pub mod modrinth;
pub mod spigot;

pub use bukkit::BukkitUpdater;
pub use custom::CustomUrlUpdater;
pub use github::GithubUpdater;
pub use jenkins::JenkinsUpdater;
pub use modrinth::ModrinthUpdater;
pub use spigot::SpigotUpdater;

use cupang_manifest::path::scalar_to_string;
use serde_yaml::Value;

/// Trimmed, non-empty scalar under `key`.
pub(crate) fn config_str(config: &Value, key: &str) -> Option<String> {
    config
        .get(key)
        .and_then(scalar_to_string)
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty())
}

pub(crate) fn config_i64(config: &Value, key: &str) -> Option<i64> {
    match config.get(key)? {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// First item whose name starts with `prefix`, ignoring case.
pub(crate) fn find_by_prefix<'a, T, F>(items: &'a [T], prefix: &str, name: F) -> Option<&'a T>
where
    F: Fn(&'a T) -> &'a str,
{
    let prefix = prefix.to_lowercase();
    items
        .iter()
        .find(|item| name(*item).to_lowercase().starts_with(&prefix))
}
