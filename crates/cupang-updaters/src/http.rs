//! ---
//! cupang_section: "08-release-sources"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Shared HTTP client for release source APIs."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
use std::collections::BTreeMap;

use cupang_core::UpdaterError;
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use tracing::debug;

pub const JSON: &str = "application/json";

/// Content types accepted for a downloadable plugin or server archive.
pub const ARCHIVE_TYPES: &[&str] = &[
    "application/java-archive",
    "application/octet-stream",
    "application/zip",
];

/// Headers sent with one request, on top of the client's user agent.
pub type Headers = BTreeMap<String, String>;

/// Thin wrapper over [`reqwest::Client`] shared by every built-in updater.
#[derive(Debug, Clone)]
pub struct ReleaseClient {
    client: reqwest::Client,
}

impl ReleaseClient {
    pub fn new(user_agent: &str) -> Result<Self, UpdaterError> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }

    /// GET `url` expecting a JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, headers: &Headers) -> Result<T, UpdaterError> {
        let response = apply(self.client.get(url), headers)
            .header(ACCEPT, JSON)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpdaterError::Status {
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }
        match media_type(response.headers()) {
            Some(kind) if kind == JSON => {}
            other => {
                return Err(UpdaterError::InvalidContent(format!(
                    "{url} answered {} instead of {JSON}",
                    other.as_deref().unwrap_or("no content type")
                )))
            }
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|err| UpdaterError::InvalidContent(format!("{url}: {err}")))
    }

    /// HEAD `url` and make sure it points at a file. An empty `accepted`
    /// list only checks the status.
    pub async fn check_file(&self, url: &str, headers: &Headers, accepted: &[&str]) -> Result<(), UpdaterError> {
        let response = apply(self.client.head(url), headers).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpdaterError::Status {
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }
        if accepted.is_empty() {
            return Ok(());
        }
        let kind = media_type(response.headers());
        if kind.as_deref().is_some_and(|kind| accepted.contains(&kind)) {
            debug!(url, content_type = ?kind, "download url checked");
            Ok(())
        } else {
            Err(UpdaterError::InvalidContent(format!(
                "{url} is not a file ({})",
                kind.as_deref().unwrap_or("no content type")
            )))
        }
    }
}

fn apply(mut request: RequestBuilder, headers: &Headers) -> RequestBuilder {
    for (name, value) in headers {
        request = request.header(name.as_str(), value.as_str());
    }
    request
}

/// Lowercased media type without parameters.
fn media_type(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    raw.split(';')
        .next()
        .map(|kind| kind.trim().to_ascii_lowercase())
        .filter(|kind| !kind.is_empty())
}

/// Join `segments` onto `base` and append `params` as a query string.
///
/// Each segment loses its outer slashes but keeps inner ones, so
/// `owner/repo` stays two path segments.
pub fn make_url<S: AsRef<str>>(base: &str, segments: &[S], params: &[(&str, &str)]) -> String {
    let mut url = base.trim_end_matches('/').to_owned();
    for segment in segments {
        url.push('/');
        url.push_str(segment.as_ref().trim_matches('/'));
    }
    if !params.is_empty() {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter().copied())
            .finish();
        url.push('?');
        url.push_str(&query);
    }
    url
}
