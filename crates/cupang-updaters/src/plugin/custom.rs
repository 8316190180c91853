//! ---
//! cupang_section: "08-release-sources"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Direct download URL updater."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
use async_trait::async_trait;
use cupang_core::{PluginQuery, PluginUpdater, PluginUpdaterDescriptor, UpdateOffer, UpdaterError};
use cupang_manifest::path::scalar_to_string;
use cupang_manifest::FieldSpec;

use crate::http::{Headers, ReleaseClient};

/// `plugins.<name>.custom_url` holds a URL that always serves the newest
/// build. Every run downloads it; the version is read from the archive.
pub struct CustomUrlUpdater {
    descriptor: PluginUpdaterDescriptor,
    client: ReleaseClient,
}

impl CustomUrlUpdater {
    pub fn new(client: ReleaseClient) -> Self {
        Self {
            descriptor: PluginUpdaterDescriptor {
                id: "custom_url".to_owned(),
                name: "Custom Url".to_owned(),
                config_schema: FieldSpec::nullable(FieldSpec::Url),
                config_default: String::new(),
                settings_schema: None,
                settings_default: None,
            },
            client,
        }
    }
}

#[async_trait]
impl PluginUpdater for CustomUrlUpdater {
    fn descriptor(&self) -> &PluginUpdaterDescriptor {
        &self.descriptor
    }

    async fn check_update(&self, query: PluginQuery) -> Result<Option<UpdateOffer>, UpdaterError> {
        let Some(url) = scalar_to_string(&query.config)
            .map(|url| url.trim().to_owned())
            .filter(|url| !url.is_empty())
        else {
            return Ok(None);
        };
        self.client.check_file(&url, &Headers::new(), &[]).await?;
        Ok(Some(UpdateOffer::new(url)))
    }
}
