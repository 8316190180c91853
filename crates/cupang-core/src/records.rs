//! ---
//! cupang_section: "03-manifest-store"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Typed snapshots of manifest records."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
//! Owned, typed views over manifest sections. These are the snapshots handed
//! to scan and update jobs; nothing here writes back to the manifest.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use cupang_manifest::path::scalar_to_string;
use cupang_manifest::{parse_timestamp, Manifest};
use serde_yaml::Value;

use crate::hash::ContentHashes;

pub const DEFAULT_COOLDOWN_HOURS: i64 = 12;

/// The `settings` section.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub last_update: Option<DateTime<Utc>>,
    pub server_folder: Option<PathBuf>,
    pub update_cooldown_hours: i64,
    pub keep_removed_plugins: bool,
    pub update_order: Vec<String>,
}

impl Settings {
    pub fn from_manifest(manifest: &Manifest) -> Self {
        Self {
            last_update: manifest
                .get_str("settings.last_update")
                .as_deref()
                .and_then(parse_timestamp),
            server_folder: manifest
                .get_str("settings.server_folder")
                .filter(|folder| !folder.trim().is_empty())
                .map(PathBuf::from),
            update_cooldown_hours: manifest
                .get("settings.update_cooldown")
                .and_then(Value::as_i64)
                .unwrap_or(DEFAULT_COOLDOWN_HOURS),
            keep_removed_plugins: manifest
                .get("settings.keep_removed_plugins")
                .and_then(Value::as_bool)
                .unwrap_or(true),
            update_order: string_list(manifest.get("settings.update_order")),
        }
    }

    pub fn plugins_folder(&self) -> Option<PathBuf> {
        self.server_folder.as_ref().map(|folder| folder.join("plugins"))
    }
}

/// One entry under `plugins`.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginRecord {
    pub name: String,
    pub exclude: bool,
    pub file: Option<String>,
    pub version: Option<String>,
    pub authors: Vec<String>,
    pub hashes: ContentHashes,
    /// The full record, including updater sections and unknown keys.
    pub raw: Value,
}

impl PluginRecord {
    pub fn from_value(name: impl Into<String>, value: &Value) -> Self {
        Self {
            name: name.into(),
            exclude: value.get("exclude").and_then(Value::as_bool).unwrap_or(false),
            file: value
                .get("file")
                .and_then(scalar_to_string)
                .filter(|file| !file.is_empty()),
            version: value.get("version").and_then(scalar_to_string),
            authors: string_list(value.get("authors")),
            hashes: ContentHashes::from_value(value.get("hashes")),
            raw: value.clone(),
        }
    }

    /// All records under `plugins`, in document order.
    pub fn all(manifest: &Manifest) -> Vec<PluginRecord> {
        manifest
            .get("plugins")
            .and_then(Value::as_mapping)
            .map(|plugins| {
                plugins
                    .iter()
                    .filter_map(|(key, value)| {
                        scalar_to_string(key).map(|name| PluginRecord::from_value(name, value))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The updater section `id`, when present and not null.
    pub fn section(&self, id: &str) -> Option<&Value> {
        self.raw.get(id).filter(|value| !value.is_null())
    }
}

/// The `server` section.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerRecord {
    pub enable: bool,
    pub file: String,
    pub server_type: String,
    pub version: String,
    pub build_number: Option<i64>,
    pub custom_download_url: Option<String>,
    pub hashes: ContentHashes,
}

impl ServerRecord {
    pub fn from_manifest(manifest: &Manifest) -> Self {
        Self {
            enable: manifest
                .get("server.enable")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            file: manifest
                .get_str("server.file")
                .unwrap_or_else(|| "server.jar".to_owned()),
            server_type: manifest
                .get_str("server.type")
                .map(|t| t.trim().to_ascii_lowercase())
                .unwrap_or_default(),
            version: manifest.get_str("server.version").unwrap_or_default(),
            build_number: manifest.get("server.build_number").and_then(Value::as_i64),
            custom_download_url: manifest.get_str("server.custom_download_url"),
            hashes: ContentHashes::from_value(manifest.get("server.hashes")),
        }
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Sequence(items)) => items.iter().filter_map(scalar_to_string).collect(),
        Some(other) => scalar_to_string(other).into_iter().collect(),
        None => Vec::new(),
    }
}
