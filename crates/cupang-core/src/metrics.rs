//! ---
//! cupang_section: "07-update-orchestration"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Prometheus counters for update runs."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
use std::path::Path;
use std::sync::Arc;

use prometheus::{IntCounterVec, Opts, Registry, TextEncoder};
use tracing::debug;

use crate::download::staged_path;
use crate::error::{CoreError, Result};

/// Shared registry type used by the CLI and the orchestrator.
pub type SharedRegistry = Arc<Registry>;

pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Counters recorded by the orchestrator.
#[derive(Clone, Debug)]
pub struct UpdateMetrics {
    registry: SharedRegistry,
    artifacts_updated: IntCounterVec,
    download_failures: IntCounterVec,
    updater_errors: IntCounterVec,
}

impl UpdateMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let artifacts_updated = IntCounterVec::new(
            Opts::new(
                "cupang_artifacts_updated_total",
                "Artifacts replaced by a newer release, by kind and updater",
            ),
            &["kind", "updater"],
        )?;
        registry.register(Box::new(artifacts_updated.clone()))?;

        let download_failures = IntCounterVec::new(
            Opts::new(
                "cupang_download_failures_total",
                "Downloads that failed after an updater reported an offer",
            ),
            &["updater"],
        )?;
        registry.register(Box::new(download_failures.clone()))?;

        let updater_errors = IntCounterVec::new(
            Opts::new(
                "cupang_updater_errors_total",
                "Update checks that returned an error or panicked",
            ),
            &["updater"],
        )?;
        registry.register(Box::new(updater_errors.clone()))?;

        Ok(Self {
            registry,
            artifacts_updated,
            download_failures,
            updater_errors,
        })
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn record_update(&self, kind: &str, updater: &str) {
        self.artifacts_updated.with_label_values(&[kind, updater]).inc();
    }

    pub fn record_download_failure(&self, updater: &str) {
        self.download_failures.with_label_values(&[updater]).inc();
    }

    pub fn record_updater_error(&self, updater: &str) {
        self.updater_errors.with_label_values(&[updater]).inc();
    }

    /// Text exposition of every family in the registry.
    pub fn render(&self) -> Result<String> {
        Ok(TextEncoder::new().encode_to_string(&self.registry.gather())?)
    }

    /// Write [`render`](Self::render) to a node-exporter textfile path,
    /// replacing the previous file atomically.
    pub fn write_textfile(&self, path: &Path) -> Result<()> {
        let body = self.render()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| CoreError::io(parent, err))?;
        }
        let staged = staged_path(path);
        std::fs::write(&staged, body).map_err(|err| CoreError::io(&staged, err))?;
        std::fs::rename(&staged, path).map_err(|err| CoreError::io(path, err))?;
        debug!(path = %path.display(), "metrics textfile written");
        Ok(())
    }
}
