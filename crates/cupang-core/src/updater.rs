//! ---
//! cupang_section: "05-updater-registry"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Updater capability contracts."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
//! Capability contracts between the orchestrator and release sources.
//!
//! An updater inspects its source and either returns an [`UpdateOffer`]
//! (there is something newer, here is where to fetch it) or `Ok(None)`.
//! Errors are reported, never raised past the chain: the orchestrator logs
//! them and moves on to the next updater.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use cupang_manifest::FieldSpec;
use serde_yaml::Value;

use crate::error::UpdaterError;
use crate::hash::FileHash;

/// Static description of a plugin updater.
#[derive(Debug, Clone)]
pub struct PluginUpdaterDescriptor {
    /// Section id under each plugin record and under `updater_settings`.
    /// Lowercase without whitespace or dots.
    pub id: String,
    /// Display name, also used in downloaded file names.
    pub name: String,
    pub config_schema: FieldSpec,
    /// YAML text of the per-plugin default. Comments are kept.
    pub config_default: String,
    pub settings_schema: Option<FieldSpec>,
    /// YAML text of the `updater_settings.<id>` default.
    pub settings_default: Option<String>,
}

/// Static description of a server updater.
#[derive(Debug, Clone)]
pub struct ServerUpdaterDescriptor {
    pub name: String,
    /// Lowercase `server.type` values this updater can handle.
    pub server_types: Vec<String>,
}

/// Inputs for one plugin check. Everything is an owned snapshot.
#[derive(Debug, Clone)]
pub struct PluginQuery {
    pub plugin_name: String,
    pub plugin_version: String,
    /// Current file; may not exist when the manifest is ahead of the disk.
    pub file: PathBuf,
    pub hash: Arc<FileHash>,
    /// `plugins.<name>.<id>`.
    pub config: Value,
    /// `updater_settings.<id>`, null when unset.
    pub settings: Value,
}

/// Inputs for one server check.
#[derive(Debug, Clone)]
pub struct ServerQuery {
    pub server_type: String,
    pub server_version: String,
    pub build_number: Option<i64>,
    pub custom_download_url: Option<String>,
    pub hash: Arc<FileHash>,
}

/// A newer artifact reported by an updater.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOffer {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    /// Version at the source. `None` means read it from the downloaded archive.
    pub version: Option<String>,
    pub build_number: Option<i64>,
    /// Writes relative to `plugins.<name>.<id>`; the key `.` is the section
    /// itself.
    pub plugin_config_updates: Vec<(String, Value)>,
    /// Writes relative to `updater_settings.<id>`.
    pub updater_config_updates: Vec<(String, Value)>,
}

impl UpdateOffer {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_build_number(mut self, build_number: i64) -> Self {
        self.build_number = Some(build_number);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_plugin_config_update(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.plugin_config_updates.push((key.into(), value.into()));
        self
    }

    pub fn with_updater_config_update(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.updater_config_updates.push((key.into(), value.into()));
        self
    }
}

#[async_trait]
pub trait PluginUpdater: Send + Sync {
    fn descriptor(&self) -> &PluginUpdaterDescriptor;

    async fn check_update(&self, query: PluginQuery) -> Result<Option<UpdateOffer>, UpdaterError>;
}

#[async_trait]
pub trait ServerUpdater: Send + Sync {
    fn descriptor(&self) -> &ServerUpdaterDescriptor;

    async fn check_update(&self, query: ServerQuery) -> Result<Option<UpdateOffer>, UpdaterError>;
}
