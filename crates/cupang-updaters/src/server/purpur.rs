//! ---
//! cupang_section: "08-release-sources"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "PurpurMC API updater."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
use async_trait::async_trait;
use cupang_core::{ServerQuery, ServerUpdater, ServerUpdaterDescriptor, UpdateOffer, UpdaterError};
use serde::Deserialize;
use serde_json::Value;

use crate::http::{make_url, Headers, ReleaseClient};

pub const PURPUR_API: &str = "https://api.purpurmc.org/v2/purpur";

#[derive(Debug, Deserialize)]
struct VersionInfo {
    builds: Builds,
}

#[derive(Debug, Deserialize)]
struct Builds {
    /// The API sends this as a string.
    latest: Value,
}

/// PurpurMC. Compares the newest build number with `server.build_number`.
pub struct PurpurUpdater {
    descriptor: ServerUpdaterDescriptor,
    client: ReleaseClient,
    api_base: String,
}

impl PurpurUpdater {
    pub fn new(client: ReleaseClient) -> Self {
        Self {
            descriptor: ServerUpdaterDescriptor {
                name: "PurpurMC".to_owned(),
                server_types: vec!["purpur".to_owned()],
            },
            client,
            api_base: PURPUR_API.to_owned(),
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }
}

fn build_number(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl ServerUpdater for PurpurUpdater {
    fn descriptor(&self) -> &ServerUpdaterDescriptor {
        &self.descriptor
    }

    async fn check_update(&self, query: ServerQuery) -> Result<Option<UpdateOffer>, UpdaterError> {
        let version = query.server_version.trim();
        let headers = Headers::new();
        let info: VersionInfo = self
            .client
            .get_json(&make_url(&self.api_base, &[version], &[]), &headers)
            .await?;
        let latest = build_number(&info.builds.latest).ok_or_else(|| {
            UpdaterError::InvalidContent(format!("unreadable latest build {}", info.builds.latest))
        })?;
        if query.build_number == Some(latest) {
            return Ok(None);
        }

        let build = latest.to_string();
        let url = make_url(&self.api_base, &[version, build.as_str(), "download"], &[]);
        self.client
            .check_file(&url, &headers, &["application/octet-stream"])
            .await?;
        Ok(Some(
            UpdateOffer::new(url)
                .with_version(version)
                .with_build_number(latest),
        ))
    }
}
