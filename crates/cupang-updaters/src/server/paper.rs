//! ---
//! cupang_section: "08-release-sources"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "PaperMC downloads API updater."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
//! PaperMC (`paper`, `waterfall`). The newest build for the configured
//! version is compared by sha256 against the installed server file.

use async_trait::async_trait;
use cupang_core::{ServerQuery, ServerUpdater, ServerUpdaterDescriptor, UpdateOffer, UpdaterError};
use cupang_logging::{cu_debug, LogContext};
use serde::Deserialize;

use crate::http::{make_url, Headers, ReleaseClient};

pub const PAPER_API: &str = "https://api.papermc.io/v2/projects";

const PAPER_ARCHIVE_TYPES: &[&str] = &["application/java-archive", "application/zip"];

#[derive(Debug, Deserialize)]
struct BuildList {
    builds: Vec<Build>,
}

#[derive(Debug, Deserialize)]
struct Build {
    build: i64,
    downloads: Downloads,
}

#[derive(Debug, Deserialize)]
struct Downloads {
    application: Application,
}

#[derive(Debug, Deserialize)]
struct Application {
    #[serde(default)]
    name: Option<String>,
    sha256: String,
}

pub struct PaperUpdater {
    descriptor: ServerUpdaterDescriptor,
    client: ReleaseClient,
    api_base: String,
}

impl PaperUpdater {
    pub fn new(client: ReleaseClient) -> Self {
        Self {
            descriptor: ServerUpdaterDescriptor {
                name: "PaperMC".to_owned(),
                server_types: vec!["paper".to_owned(), "waterfall".to_owned()],
            },
            client,
            api_base: PAPER_API.to_owned(),
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }
}

#[async_trait]
impl ServerUpdater for PaperUpdater {
    fn descriptor(&self) -> &ServerUpdaterDescriptor {
        &self.descriptor
    }

    async fn check_update(&self, query: ServerQuery) -> Result<Option<UpdateOffer>, UpdaterError> {
        let project = query.server_type.trim().to_ascii_lowercase();
        let version = query.server_version.trim();
        let headers = Headers::new();
        let list: BuildList = self
            .client
            .get_json(
                &make_url(&self.api_base, &[project.as_str(), "versions", version, "builds"], &[]),
                &headers,
            )
            .await?;
        let latest = list
            .builds
            .into_iter()
            .max_by_key(|build| build.build)
            .ok_or_else(|| UpdaterError::InvalidContent(format!("no {project} builds for {version}")))?;

        let remote = latest.downloads.application.sha256;
        let local = query.hash.sha256().unwrap_or_default();
        if local.eq_ignore_ascii_case(&remote) {
            cu_debug!(
                context = LogContext::new().with_updater(&self.descriptor.name),
                "{project} {version} build {} already installed",
                latest.build
            );
            return Ok(None);
        }

        let build = latest.build.to_string();
        let file_name = latest
            .downloads
            .application
            .name
            .unwrap_or_else(|| format!("{project}-{version}-{build}.jar"));
        let url = make_url(
            &self.api_base,
            &[project.as_str(), "versions", version, "builds", build.as_str(), "downloads", file_name.as_str()],
            &[],
        );
        self.client.check_file(&url, &headers, PAPER_ARCHIVE_TYPES).await?;

        Ok(Some(
            UpdateOffer::new(url)
                .with_version(version)
                .with_build_number(latest.build),
        ))
    }
}
