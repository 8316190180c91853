//! ---
//! cupang_section: "08-release-sources"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "SpigotMC updater backed by the Spiget API."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
use async_trait::async_trait;
use cupang_core::{PluginQuery, PluginUpdater, PluginUpdaterDescriptor, UpdateOffer, UpdaterError};
use cupang_logging::{cu_info, LogContext};
use cupang_manifest::{FieldSpec, MapSpec};
use cupang_versioning::OrderedVersion;
use serde::Deserialize;

use super::config_i64;
use crate::http::{make_url, Headers, ReleaseClient};

pub const SPIGET_API: &str = "https://api.spiget.org/v2";

const CONFIG_DEFAULT: &str = "\
resource_id: # number in the spigotmc url, 18494 for spigotmc.org/resources/discordsrv.18494
";

#[derive(Debug, Deserialize)]
struct Resource {
    #[serde(default)]
    premium: bool,
}

#[derive(Debug, Deserialize)]
struct LatestVersion {
    name: String,
}

pub struct SpigotUpdater {
    descriptor: PluginUpdaterDescriptor,
    client: ReleaseClient,
    api_base: String,
}

impl SpigotUpdater {
    pub fn new(client: ReleaseClient) -> Self {
        Self {
            descriptor: PluginUpdaterDescriptor {
                id: "spigot".to_owned(),
                name: "Spigot".to_owned(),
                config_schema: MapSpec::new()
                    .required("resource_id", FieldSpec::nullable(FieldSpec::Int))
                    .into(),
                config_default: CONFIG_DEFAULT.to_owned(),
                settings_schema: None,
                settings_default: None,
            },
            client,
            api_base: SPIGET_API.to_owned(),
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }
}

#[async_trait]
impl PluginUpdater for SpigotUpdater {
    fn descriptor(&self) -> &PluginUpdaterDescriptor {
        &self.descriptor
    }

    async fn check_update(&self, query: PluginQuery) -> Result<Option<UpdateOffer>, UpdaterError> {
        let Some(resource_id) = config_i64(&query.config, "resource_id") else {
            return Ok(None);
        };
        let id = resource_id.to_string();
        let headers = Headers::new();
        let resource: Resource = self
            .client
            .get_json(&make_url(&self.api_base, &["resources", id.as_str()], &[]), &headers)
            .await?;
        let latest: LatestVersion = self
            .client
            .get_json(
                &make_url(&self.api_base, &["resources", id.as_str(), "versions", "latest"], &[]),
                &headers,
            )
            .await?;

        if OrderedVersion::parse(&query.plugin_version) >= OrderedVersion::parse(&latest.name) {
            return Ok(None);
        }
        if resource.premium {
            cu_info!(
                context = LogContext::new()
                    .with_artifact(&query.plugin_name)
                    .with_updater(&self.descriptor.id),
                "{} is premium, download it yourself at https://www.spigotmc.org/resources/{id}",
                latest.name
            );
            return Ok(None);
        }

        let url = make_url(&self.api_base, &["resources", id.as_str(), "download"], &[]);
        self.client.check_file(&url, &headers, &[]).await?;
        Ok(Some(UpdateOffer::new(url).with_version(latest.name.trim())))
    }
}
