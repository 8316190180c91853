//! ---
//! cupang_section: "07-update-orchestration"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Update orchestration engine for server and plugin artifacts."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
//! Core of cupang-updater.
//!
//! The [`scan::InventoryScanner`] reconciles the plugin folder with the
//! manifest, the [`registry::UpdaterRegistry`] holds the release-source
//! strategies, and the [`orchestrator::UpdateOrchestrator`] walks each
//! artifact through its updater chain, downloads through an
//! [`download::ArtifactFetcher`] and commits the results.

pub mod bootstrap;
pub mod cooldown;
pub mod download;
pub mod error;
pub mod hash;
pub mod inspect;
pub mod metrics;
pub mod orchestrator;
pub mod records;
pub mod registry;
pub mod scan;
pub mod stop;
pub mod updater;

pub use bootstrap::{prepare_manifest, set_server_folder};
pub use download::{
    publish_artifact, ArtifactFetcher, DownloadJob, DownloadOutcome, Downloader, JobState,
    ProgressSink, TracingProgress,
};
pub use error::{CoreError, DownloadError, RegistryError, Result, UpdaterError};
pub use hash::{ContentHashes, FileHash, HashAlgorithm};
pub use inspect::{ArtifactInspector, ArtifactMetadata, InspectError, JarInspector};
pub use metrics::{new_registry, SharedRegistry, UpdateMetrics};
pub use orchestrator::{
    OrchestratorConfig, PluginUpdateResult, RunOutcome, RunReport, ServerUpdateResult,
    UpdateOrchestrator,
};
pub use records::{PluginRecord, ServerRecord, Settings};
pub use registry::{ConfigKind, UpdaterRegistry};
pub use scan::{InventoryScanner, ReconciliationReport};
pub use stop::StopFlag;
pub use updater::{
    PluginQuery, PluginUpdater, PluginUpdaterDescriptor, ServerQuery, ServerUpdater,
    ServerUpdaterDescriptor, UpdateOffer,
};

pub use async_trait::async_trait;
