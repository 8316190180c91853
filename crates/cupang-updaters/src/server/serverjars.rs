//! ---
//! cupang_section: "08-release-sources"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "ServerJars API updater."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
//! ServerJars (`purpur`, `bungeecord`, `velocity`). The API has no build
//! numbers; the published md5 is compared against the installed server file.

use async_trait::async_trait;
use cupang_core::{ServerQuery, ServerUpdater, ServerUpdaterDescriptor, UpdateOffer, UpdaterError};
use cupang_logging::{cu_debug, LogContext};
use serde::Deserialize;

use crate::http::{make_url, Headers, ReleaseClient};

pub const SERVERJARS_API: &str = "https://serverjars.com/api";

const SERVERJARS_ARCHIVE_TYPES: &[&str] = &["application/java-archive", "application/zip"];

const CATEGORIES: &[(&str, &[&str])] = &[
    ("proxies", &["waterfall", "bungeecord", "velocity"]),
    ("servers", &["purpur"]),
];

#[derive(Debug, Deserialize)]
struct Details {
    status: String,
    #[serde(default)]
    response: Option<JarDetails>,
}

#[derive(Debug, Deserialize)]
struct JarDetails {
    md5: String,
}

pub struct ServerjarsUpdater {
    descriptor: ServerUpdaterDescriptor,
    client: ReleaseClient,
    api_base: String,
}

impl ServerjarsUpdater {
    pub fn new(client: ReleaseClient) -> Self {
        Self {
            descriptor: ServerUpdaterDescriptor {
                name: "Serverjars".to_owned(),
                server_types: vec!["purpur".to_owned(), "bungeecord".to_owned(), "velocity".to_owned()],
            },
            client,
            api_base: SERVERJARS_API.to_owned(),
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }
}

fn category(server_type: &str) -> Option<&'static str> {
    CATEGORIES
        .iter()
        .find(|(_, types)| types.iter().any(|t| t.eq_ignore_ascii_case(server_type)))
        .map(|(category, _)| *category)
}

/// `type` alone asks for the newest release, `type/version` pins one.
fn jar_path(server_type: &str, version: &str) -> String {
    if version.is_empty() {
        server_type.to_owned()
    } else {
        format!("{server_type}/{version}")
    }
}

#[async_trait]
impl ServerUpdater for ServerjarsUpdater {
    fn descriptor(&self) -> &ServerUpdaterDescriptor {
        &self.descriptor
    }

    async fn check_update(&self, query: ServerQuery) -> Result<Option<UpdateOffer>, UpdaterError> {
        let server_type = query.server_type.trim().to_ascii_lowercase();
        let Some(category) = category(&server_type) else {
            return Ok(None);
        };
        let version = query.server_version.trim();
        let jar = jar_path(&server_type, version);
        let headers = Headers::new();

        let details: Details = self
            .client
            .get_json(&make_url(&self.api_base, &["fetchDetails", category, jar.as_str()], &[]), &headers)
            .await?;
        let remote = match details.response {
            Some(jar) if details.status.eq_ignore_ascii_case("success") => jar.md5,
            _ => {
                return Err(UpdaterError::InvalidContent(format!(
                    "serverjars answered `{}` for {jar}",
                    details.status
                )))
            }
        };

        let local = query.hash.md5().unwrap_or_default();
        if local.eq_ignore_ascii_case(&remote) {
            cu_debug!(
                context = LogContext::new().with_updater(&self.descriptor.name),
                "{jar} already installed"
            );
            return Ok(None);
        }

        let url = make_url(&self.api_base, &["fetchJar", category, jar.as_str()], &[]);
        self.client.check_file(&url, &headers, SERVERJARS_ARCHIVE_TYPES).await?;
        Ok(Some(UpdateOffer::new(url).with_version(version)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_split_proxies_from_servers() {
        assert_eq!(category("purpur"), Some("servers"));
        assert_eq!(category("Velocity"), Some("proxies"));
        assert_eq!(category("paper"), None);
    }

    #[test]
    fn version_is_optional_in_jar_path() {
        assert_eq!(jar_path("purpur", "1.20.4"), "purpur/1.20.4");
        assert_eq!(jar_path("velocity", ""), "velocity");
    }
}
