//! ---
//! cupang_section: "08-release-sources"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "BukkitDev updater backed by the CurseForge servermods API."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
//! BukkitDev. Takes the most recently released file of a project and
//! compares its md5 with the installed plugin.

use async_trait::async_trait;
use cupang_core::{PluginQuery, PluginUpdater, PluginUpdaterDescriptor, UpdateOffer, UpdaterError};
use cupang_logging::{cu_warn, LogContext};
use cupang_manifest::{FieldSpec, MapSpec};
use cupang_versioning::OrderedVersion;
use serde::Deserialize;

use super::config_i64;
use crate::http::{make_url, Headers, ReleaseClient, ARCHIVE_TYPES};

pub const SERVERMODS_API: &str = "https://api.curseforge.com/servermods";

const CONFIG_DEFAULT: &str = "\
# In \"About This Project\" on the plugin page,
# for example 71561 for https://dev.bukkit.org/projects/mythicmobs
project_id:
";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectFile {
    name: String,
    #[serde(default)]
    download_url: Option<String>,
    md5: String,
    date_released: String,
}

impl ProjectFile {
    /// Milliseconds from the `/Date(1700000000000)/` wrapper.
    fn released_millis(&self) -> Option<i64> {
        let inner = self.date_released.split_once("Date(")?.1;
        let digits: String = inner.chars().take_while(char::is_ascii_digit).collect();
        digits.parse().ok()
    }
}

pub struct BukkitUpdater {
    descriptor: PluginUpdaterDescriptor,
    client: ReleaseClient,
    api_base: String,
}

impl BukkitUpdater {
    pub fn new(client: ReleaseClient) -> Self {
        Self {
            descriptor: PluginUpdaterDescriptor {
                id: "bukkit".to_owned(),
                name: "Bukkit".to_owned(),
                config_schema: MapSpec::new()
                    .required("project_id", FieldSpec::nullable(FieldSpec::Int))
                    .into(),
                config_default: CONFIG_DEFAULT.to_owned(),
                settings_schema: None,
                settings_default: None,
            },
            client,
            api_base: SERVERMODS_API.to_owned(),
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }
}

#[async_trait]
impl PluginUpdater for BukkitUpdater {
    fn descriptor(&self) -> &PluginUpdaterDescriptor {
        &self.descriptor
    }

    async fn check_update(&self, query: PluginQuery) -> Result<Option<UpdateOffer>, UpdaterError> {
        let Some(project_id) = config_i64(&query.config, "project_id") else {
            return Ok(None);
        };
        let ctx = LogContext::new()
            .with_artifact(&query.plugin_name)
            .with_updater(&self.descriptor.id);
        let id = project_id.to_string();
        let files: Vec<ProjectFile> = self
            .client
            .get_json(
                &make_url(&self.api_base, &["files"], &[("projectIds", id.as_str())]),
                &Headers::new(),
            )
            .await?;
        let Some(latest) = files
            .iter()
            .filter_map(|file| file.released_millis().map(|at| (at, file)))
            .max_by_key(|(at, _)| *at)
            .map(|(_, file)| file)
        else {
            cu_warn!(context = ctx, "project {id} has no released files");
            return Ok(None);
        };

        let local = query.hash.md5().unwrap_or_default();
        if local.eq_ignore_ascii_case(&latest.md5) {
            return Ok(None);
        }
        let Some(url) = latest.download_url.as_deref().filter(|url| !url.trim().is_empty()) else {
            cu_warn!(context = ctx, "{} has no download url", latest.name);
            return Ok(None);
        };

        self.client.check_file(url, &Headers::new(), ARCHIVE_TYPES).await?;
        Ok(Some(
            UpdateOffer::new(url).with_version(OrderedVersion::parse(&latest.name).to_string()),
        ))
    }
}
