//! ---
//! cupang_section: "08-release-sources"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Modrinth project version updater."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
//! Modrinth. Picks the most recently published `release` version of a
//! project, optionally filtered by loaders and game versions, and compares
//! its version number with the installed one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cupang_core::{PluginQuery, PluginUpdater, PluginUpdaterDescriptor, UpdateOffer, UpdaterError};
use cupang_logging::{cu_debug, LogContext};
use cupang_manifest::path::scalar_to_string;
use cupang_manifest::{FieldSpec, MapSpec};
use cupang_versioning::OrderedVersion;
use serde::Deserialize;
use serde_yaml::Value;

use super::{config_str, find_by_prefix};
use crate::http::{make_url, Headers, ReleaseClient, ARCHIVE_TYPES};

pub const MODRINTH_API: &str = "https://api.modrinth.com/v2";

const CONFIG_DEFAULT: &str = "\
id: # project id or slug, modrinth.com/plugin/<id>
name_startwith: # file name prefix, for example Geyser-Spigot
loaders: # paper, or a list like [paper, folia]
game_versions: # quote versions, '1.20.4' or a list like ['1.20.4', '1.18.2']
";

#[derive(Debug, Deserialize)]
struct ProjectVersion {
    version_number: String,
    version_type: String,
    date_published: String,
    #[serde(default)]
    files: Vec<VersionFile>,
}

#[derive(Debug, Deserialize)]
struct VersionFile {
    filename: String,
    url: String,
    #[serde(default)]
    primary: bool,
}

pub struct ModrinthUpdater {
    descriptor: PluginUpdaterDescriptor,
    client: ReleaseClient,
    api_base: String,
}

impl ModrinthUpdater {
    pub fn new(client: ReleaseClient) -> Self {
        Self {
            descriptor: PluginUpdaterDescriptor {
                id: "modrinth".to_owned(),
                name: "Modrinth".to_owned(),
                config_schema: MapSpec::new()
                    .required("id", FieldSpec::nullable(FieldSpec::Str))
                    .required("name_startwith", FieldSpec::nullable(FieldSpec::Str))
                    .required("loaders", FieldSpec::nullable(FieldSpec::Any))
                    .required("game_versions", FieldSpec::nullable(FieldSpec::Any))
                    .into(),
                config_default: CONFIG_DEFAULT.to_owned(),
                settings_schema: None,
                settings_default: None,
            },
            client,
            api_base: MODRINTH_API.to_owned(),
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }
}

/// A single value, a YAML list, or a string holding a flow list.
fn string_list(value: Option<&Value>) -> Vec<String> {
    let items = match value {
        Some(Value::Sequence(items)) => items.clone(),
        Some(Value::String(text)) if text.trim_start().starts_with('[') => {
            serde_yaml::from_str::<Vec<Value>>(text).unwrap_or_default()
        }
        Some(other) => vec![other.clone()],
        None => Vec::new(),
    };
    items
        .iter()
        .filter_map(scalar_to_string)
        .map(|item| item.trim().to_owned())
        .filter(|item| !item.is_empty())
        .collect()
}

fn published(version: &ProjectVersion) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&version.date_published)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

fn list_param(items: &[String]) -> Result<String, UpdaterError> {
    serde_json::to_string(items).map_err(|err| UpdaterError::Config(err.to_string()))
}

#[async_trait]
impl PluginUpdater for ModrinthUpdater {
    fn descriptor(&self) -> &PluginUpdaterDescriptor {
        &self.descriptor
    }

    async fn check_update(&self, query: PluginQuery) -> Result<Option<UpdateOffer>, UpdaterError> {
        let Some(project) = config_str(&query.config, "id") else {
            return Ok(None);
        };
        let ctx = LogContext::new()
            .with_artifact(&query.plugin_name)
            .with_updater(&self.descriptor.id);

        let loaders = string_list(query.config.get("loaders"));
        let game_versions = string_list(query.config.get("game_versions"));
        let loaders_param = list_param(&loaders)?;
        let game_versions_param = list_param(&game_versions)?;
        let mut params = Vec::new();
        if !loaders.is_empty() {
            params.push(("loaders", loaders_param.as_str()));
        }
        if !game_versions.is_empty() {
            params.push(("game_versions", game_versions_param.as_str()));
        }

        let versions: Vec<ProjectVersion> = self
            .client
            .get_json(
                &make_url(&self.api_base, &["project", project.as_str(), "version"], &params),
                &Headers::new(),
            )
            .await?;
        let Some((_, latest)) = versions
            .iter()
            .filter(|version| version.version_type.eq_ignore_ascii_case("release"))
            .filter_map(|version| published(version).map(|at| (at, version)))
            .max_by_key(|(at, _)| *at)
        else {
            cu_debug!(context = ctx, "no release versions for {project}");
            return Ok(None);
        };

        if OrderedVersion::parse(&query.plugin_version) >= OrderedVersion::parse(&latest.version_number) {
            return Ok(None);
        }

        let file = match config_str(&query.config, "name_startwith") {
            Some(prefix) => find_by_prefix(&latest.files, &prefix, |file: &VersionFile| file.filename.as_str()),
            None => latest
                .files
                .iter()
                .find(|file| file.primary)
                .or_else(|| latest.files.first()),
        };
        let Some(file) = file else {
            cu_debug!(
                context = ctx,
                "version {} has no matching file",
                latest.version_number
            );
            return Ok(None);
        };

        self.client
            .check_file(&file.url, &Headers::new(), ARCHIVE_TYPES)
            .await?;
        Ok(Some(
            UpdateOffer::new(file.url.clone()).with_version(latest.version_number.trim()),
        ))
    }
}
