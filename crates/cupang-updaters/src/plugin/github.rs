//! ---
//! cupang_section: "08-release-sources"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "GitHub latest-release updater."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
//! GitHub releases. The latest release is compared either by the commit its
//! tag points at (recorded back into `commit`) or by a version taken from
//! the tag, the release name or the asset file name.

use async_trait::async_trait;
use cupang_core::{PluginQuery, PluginUpdater, PluginUpdaterDescriptor, UpdateOffer, UpdaterError};
use cupang_logging::{cu_warn, LogContext};
use cupang_manifest::{FieldSpec, MapSpec};
use cupang_versioning::OrderedVersion;
use serde::Deserialize;

use super::{config_str, find_by_prefix};
use crate::http::{make_url, Headers, ReleaseClient};

pub const GITHUB_API: &str = "https://api.github.com";

const CONFIG_DEFAULT: &str = "\
repo: # owner/repository, for example EssentialsX/Essentials
name_startwith: # file name prefix, for example EssentialsX-
commit: # auto generated
compare_to: commit # one of these: commit, tags, release_name, file_name
";

const SETTINGS_DEFAULT: &str = "\
github_token: # optional personal access token, raises the API rate limit
";

/// What the latest release is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareTo {
    Commit,
    Tags,
    ReleaseName,
    FileName,
}

impl CompareTo {
    pub const ALL: [&'static str; 4] = ["commit", "tags", "release_name", "file_name"];

    fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::to_ascii_lowercase).as_deref() {
            Some("tags") => Self::Tags,
            Some("release_name") => Self::ReleaseName,
            Some("file_name") => Self::FileName,
            _ => Self::Commit,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    assets: Vec<Asset>,
}

#[derive(Debug, Deserialize)]
struct Asset {
    name: String,
    browser_download_url: String,
}

#[derive(Debug, Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Debug, Deserialize)]
struct GitObject {
    sha: String,
}

pub struct GithubUpdater {
    descriptor: PluginUpdaterDescriptor,
    client: ReleaseClient,
    api_base: String,
}

impl GithubUpdater {
    pub fn new(client: ReleaseClient) -> Self {
        Self {
            descriptor: PluginUpdaterDescriptor {
                id: "github".to_owned(),
                name: "Github".to_owned(),
                config_schema: MapSpec::new()
                    .required("repo", FieldSpec::nullable(FieldSpec::Str))
                    .required("name_startwith", FieldSpec::nullable(FieldSpec::Str))
                    .required("commit", FieldSpec::nullable(FieldSpec::Str))
                    .required(
                        "compare_to",
                        FieldSpec::nullable(FieldSpec::OneOf(
                            CompareTo::ALL.iter().map(|s| s.to_string()).collect(),
                        )),
                    )
                    .into(),
                config_default: CONFIG_DEFAULT.to_owned(),
                settings_schema: Some(
                    MapSpec::new()
                        .required("github_token", FieldSpec::nullable(FieldSpec::Str))
                        .into(),
                ),
                settings_default: Some(SETTINGS_DEFAULT.to_owned()),
            },
            client,
            api_base: GITHUB_API.to_owned(),
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }
}

#[async_trait]
impl PluginUpdater for GithubUpdater {
    fn descriptor(&self) -> &PluginUpdaterDescriptor {
        &self.descriptor
    }

    async fn check_update(&self, query: PluginQuery) -> Result<Option<UpdateOffer>, UpdaterError> {
        let Some(repo) = config_str(&query.config, "repo") else {
            return Ok(None);
        };
        let ctx = LogContext::new()
            .with_artifact(&query.plugin_name)
            .with_updater(&self.descriptor.id);
        let Some(prefix) = config_str(&query.config, "name_startwith") else {
            cu_warn!(context = ctx, "github.repo is set but github.name_startwith is empty");
            return Ok(None);
        };
        let compare_to = CompareTo::parse(config_str(&query.config, "compare_to").as_deref());

        let mut headers = Headers::new();
        if let Some(token) = config_str(&query.settings, "github_token") {
            headers.insert("Authorization".to_owned(), format!("Bearer {token}"));
        }

        let release: Release = self
            .client
            .get_json(
                &make_url(&self.api_base, &["repos", repo.as_str(), "releases", "latest"], &[]),
                &headers,
            )
            .await?;
        let tag: GitRef = self
            .client
            .get_json(
                &make_url(
                    &self.api_base,
                    &["repos", repo.as_str(), "git", "ref", "tags", release.tag_name.as_str()],
                    &[],
                ),
                &headers,
            )
            .await?;
        let remote_commit = tag.object.sha;
        let asset = find_by_prefix(&release.assets, &prefix, |asset: &Asset| asset.name.as_str());

        let version = match compare_to {
            CompareTo::Commit => {
                if config_str(&query.config, "commit").as_deref() == Some(remote_commit.as_str()) {
                    return Ok(None);
                }
                None
            }
            other => {
                let remote = match other {
                    CompareTo::Tags => release.tag_name.trim().to_owned(),
                    CompareTo::ReleaseName => release
                        .name
                        .as_deref()
                        .map(str::trim)
                        .filter(|name| !name.is_empty())
                        .unwrap_or(release.tag_name.trim())
                        .to_owned(),
                    _ => match asset {
                        Some(asset) => OrderedVersion::parse(&asset.name).to_string(),
                        None => return Ok(None),
                    },
                };
                if OrderedVersion::parse(&query.plugin_version) >= OrderedVersion::parse(&remote) {
                    return Ok(None);
                }
                Some(remote)
            }
        };

        let Some(asset) = asset else {
            cu_warn!(
                context = ctx,
                "release {} has no asset starting with {prefix}",
                release.tag_name
            );
            return Ok(None);
        };
        self.client
            .check_file(&asset.browser_download_url, &headers, &["application/octet-stream"])
            .await?;

        let mut offer = UpdateOffer::new(asset.browser_download_url.clone())
            .with_plugin_config_update("commit", remote_commit);
        offer.headers = headers;
        offer.version = version;
        Ok(Some(offer))
    }
}
