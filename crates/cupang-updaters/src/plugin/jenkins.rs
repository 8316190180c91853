//! ---
//! cupang_section: "08-release-sources"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Jenkins last-successful-build updater."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
use async_trait::async_trait;
use cupang_core::{PluginQuery, PluginUpdater, PluginUpdaterDescriptor, UpdateOffer, UpdaterError};
use cupang_logging::{cu_warn, LogContext};
use cupang_manifest::{FieldSpec, MapSpec};
use serde::Deserialize;

use super::{config_i64, config_str, find_by_prefix};
use crate::http::{make_url, Headers, ReleaseClient};

const CONFIG_DEFAULT: &str = "\
url: # job url, for example https://ci.example.org/job/Plugin
name_startwith: # file name prefix, for example Geyser-Spigot
build_number: # auto generated
";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Job {
    last_successful_build: Option<BuildRef>,
}

#[derive(Debug, Deserialize)]
struct BuildRef {
    url: String,
}

#[derive(Debug, Deserialize)]
struct Build {
    number: i64,
    #[serde(default)]
    artifacts: Vec<Artifact>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Artifact {
    file_name: String,
    relative_path: String,
}

/// Jenkins. Compares the last successful build number with `build_number`
/// and records the new one after an update.
pub struct JenkinsUpdater {
    descriptor: PluginUpdaterDescriptor,
    client: ReleaseClient,
}

impl JenkinsUpdater {
    pub fn new(client: ReleaseClient) -> Self {
        Self {
            descriptor: PluginUpdaterDescriptor {
                id: "jenkins".to_owned(),
                name: "Jenkins".to_owned(),
                config_schema: MapSpec::new()
                    .required("url", FieldSpec::nullable(FieldSpec::Url))
                    .required("name_startwith", FieldSpec::nullable(FieldSpec::Str))
                    .required("build_number", FieldSpec::nullable(FieldSpec::Int))
                    .into(),
                config_default: CONFIG_DEFAULT.to_owned(),
                settings_schema: None,
                settings_default: None,
            },
            client,
        }
    }
}

#[async_trait]
impl PluginUpdater for JenkinsUpdater {
    fn descriptor(&self) -> &PluginUpdaterDescriptor {
        &self.descriptor
    }

    async fn check_update(&self, query: PluginQuery) -> Result<Option<UpdateOffer>, UpdaterError> {
        let Some(job_url) = config_str(&query.config, "url") else {
            return Ok(None);
        };
        let ctx = LogContext::new()
            .with_artifact(&query.plugin_name)
            .with_updater(&self.descriptor.id);
        let Some(prefix) = config_str(&query.config, "name_startwith") else {
            cu_warn!(context = ctx, "jenkins.url is set but jenkins.name_startwith is empty");
            return Ok(None);
        };

        let headers = Headers::new();
        let job: Job = self
            .client
            .get_json(
                &make_url(&job_url, &["api/json"], &[("tree", "lastSuccessfulBuild[url]")]),
                &headers,
            )
            .await?;
        let Some(last) = job.last_successful_build else {
            cu_warn!(context = ctx, "{job_url} has no successful build");
            return Ok(None);
        };
        let build: Build = self
            .client
            .get_json(&make_url(&last.url, &["api/json"], &[]), &headers)
            .await?;

        let local = config_i64(&query.config, "build_number").unwrap_or(0);
        if local >= build.number {
            return Ok(None);
        }
        let Some(artifact) = find_by_prefix(&build.artifacts, &prefix, |artifact: &Artifact| {
            artifact.file_name.as_str()
        }) else {
            cu_warn!(
                context = ctx,
                "build {} has no artifact starting with {prefix}",
                build.number
            );
            return Ok(None);
        };

        let number = build.number.to_string();
        let url = make_url(
            &job_url,
            &[number.as_str(), "artifact", artifact.relative_path.as_str()],
            &[],
        );
        self.client.check_file(&url, &headers, &[]).await?;
        Ok(Some(
            UpdateOffer::new(url).with_plugin_config_update("build_number", build.number),
        ))
    }
}
