//! ---
//! cupang_section: "07-update-orchestration"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Cooldown gate, updater chains, bounded job pool and manifest commit."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
//! One update run: cooldown check, server update, concurrent plugin updates,
//! then a single commit into the manifest.
//!
//! Plugin jobs work on owned snapshots and never touch the manifest; only the
//! commit phase writes. Updater failures and panics are contained per
//! updater, download failures per offer, so one artifact never blocks another.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use cupang_logging::{cu_debug, cu_error, cu_info, cu_warn, log_run_event, LogContext, RunEventOutcome};
use cupang_manifest::path::split;
use cupang_manifest::Manifest;
use futures::FutureExt;
use serde_yaml::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::cooldown::{self, CooldownDecision};
use crate::download::{publish_artifact, ArtifactFetcher, DownloadJob, DownloadOutcome};
use crate::error::{CoreError, Result, UpdaterError};
use crate::hash::{ContentHashes, FileHash};
use crate::inspect::ArtifactInspector;
use crate::metrics::UpdateMetrics;
use crate::records::{PluginRecord, ServerRecord, Settings};
use crate::registry::UpdaterRegistry;
use crate::stop::StopFlag;
use crate::updater::{PluginQuery, PluginUpdater, ServerQuery, UpdateOffer};

pub const DEFAULT_WORKERS: usize = 5;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);
/// Version label used when neither the source nor the archive has one.
pub const UNKNOWN_VERSION: &str = "Latest";

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub workers: usize,
    pub poll_interval: Duration,
    /// Bypass the cooldown gate.
    pub force: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            force: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    SkippedCooldown { remaining: Duration },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerUpdateResult {
    pub updater: String,
    pub file: PathBuf,
    pub build_number: Option<i64>,
    pub hashes: ContentHashes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PluginUpdateResult {
    pub plugin: String,
    pub updater_id: String,
    pub updater_name: String,
    /// New file name inside the plugin folder.
    pub file: String,
    pub version: String,
    pub hashes: ContentHashes,
    pub plugin_config_updates: Vec<(String, Value)>,
    pub updater_config_updates: Vec<(String, Value)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub server: Option<ServerUpdateResult>,
    pub updated_plugins: Vec<PluginUpdateResult>,
    pub cancelled: bool,
}

impl RunReport {
    fn skipped(remaining: Duration) -> Self {
        Self {
            outcome: RunOutcome::SkippedCooldown { remaining },
            server: None,
            updated_plugins: Vec::new(),
            cancelled: false,
        }
    }
}

pub struct UpdateOrchestrator {
    registry: Arc<UpdaterRegistry>,
    fetcher: Arc<dyn ArtifactFetcher>,
    inspector: Arc<dyn ArtifactInspector>,
    stop: StopFlag,
    config: OrchestratorConfig,
    metrics: Option<UpdateMetrics>,
}

impl UpdateOrchestrator {
    pub fn new(
        registry: Arc<UpdaterRegistry>,
        fetcher: Arc<dyn ArtifactFetcher>,
        inspector: Arc<dyn ArtifactInspector>,
        stop: StopFlag,
    ) -> Self {
        Self {
            registry,
            fetcher,
            inspector,
            stop,
            config: OrchestratorConfig::default(),
            metrics: None,
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_metrics(mut self, metrics: UpdateMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn run(&self, manifest: &mut Manifest) -> Result<RunReport> {
        self.run_at(manifest, Utc::now()).await
    }

    /// [`run`](Self::run) with an explicit clock.
    pub async fn run_at(&self, manifest: &mut Manifest, now: DateTime<Utc>) -> Result<RunReport> {
        let settings = Settings::from_manifest(manifest);
        let run_ctx = LogContext::new().with_phase("cooldown");
        if let CooldownDecision::Wait { remaining } = cooldown::evaluate(
            settings.last_update,
            settings.update_cooldown_hours,
            now,
            self.config.force,
        ) {
            log_run_event(
                Some(&run_ctx),
                "update.cooldown",
                &format!(
                    "still in cooldown, {} hours remaining",
                    cooldown::remaining_hours(remaining)
                ),
                RunEventOutcome::Skipped,
            );
            return Ok(RunReport::skipped(remaining));
        }

        let server_folder = settings
            .server_folder
            .clone()
            .ok_or(CoreError::ServerFolderUnset)?;

        let server_record = ServerRecord::from_manifest(manifest);
        let server = if server_record.enable && !self.stop.is_set() {
            self.update_server(&server_folder, &server_record).await
        } else {
            None
        };
        if let Some(result) = &server {
            commit_server(manifest, result);
        }

        let plugins_folder = server_folder.join("plugins");
        if !plugins_folder.is_dir() {
            if server.is_some() {
                manifest.save()?;
            }
            log_run_event(
                Some(&LogContext::new().with_phase("plugin-update")),
                "update.failed",
                &format!("plugin folder {} does not exist", plugins_folder.display()),
                RunEventOutcome::Fault,
            );
            return Err(CoreError::FolderNotFound(plugins_folder));
        }

        let updated_plugins = self.update_plugins(manifest, &settings, &plugins_folder).await;
        let cancelled = self.stop.is_set();

        for result in &updated_plugins {
            commit_plugin(manifest, result);
        }
        if !cancelled {
            manifest.put_at(
                &["settings", "last_update"],
                now.to_rfc3339_opts(SecondsFormat::Secs, true),
            );
        }
        manifest.save()?;

        let commit_ctx = LogContext::new().with_phase("commit");
        log_run_event(
            Some(&commit_ctx),
            "update.finished",
            &format!(
                "server {}, {} plugin(s) updated{}",
                if server.is_some() { "updated" } else { "unchanged" },
                updated_plugins.len(),
                if cancelled { ", run cancelled" } else { "" }
            ),
            if cancelled {
                RunEventOutcome::Skipped
            } else {
                RunEventOutcome::Success
            },
        );

        Ok(RunReport {
            outcome: RunOutcome::Completed,
            server,
            updated_plugins,
            cancelled,
        })
    }

    async fn update_server(&self, folder: &Path, record: &ServerRecord) -> Option<ServerUpdateResult> {
        let target = folder.join(&record.file);
        let known = if target.is_file() {
            record.hashes.clone()
        } else {
            absent_hashes()
        };
        let hash = Arc::new(FileHash::with_known_hashes(&target, known));
        let candidates = self.registry.updaters_for_server_type(&record.server_type);
        if candidates.is_empty() {
            cu_warn!(
                context = LogContext::new().with_artifact("server").with_phase("server-update"),
                "no server updater supports type `{}`",
                record.server_type
            );
            return None;
        }

        for updater in candidates {
            let name = updater.descriptor().name.clone();
            let ctx = LogContext::new()
                .with_artifact("server")
                .with_updater(&name)
                .with_phase("server-update");
            let query = ServerQuery {
                server_type: record.server_type.clone(),
                server_version: record.version.clone(),
                build_number: record.build_number,
                custom_download_url: record.custom_download_url.clone(),
                hash: Arc::clone(&hash),
            };
            let offer = match guarded_check(updater.check_update(query), &self.stop).await {
                Checked::Offer(offer) => offer,
                Checked::Current => {
                    cu_info!(context = ctx, "no server update");
                    continue;
                }
                Checked::Failed(reason) => {
                    cu_error!(context = ctx, "update check failed: {}", reason);
                    self.record_updater_error(&name);
                    continue;
                }
                Checked::Stopped => return None,
            };

            let label = offer
                .build_number
                .map(|build| build.to_string())
                .or_else(|| offer.version.clone())
                .unwrap_or_else(|| UNKNOWN_VERSION.to_owned());
            let job = DownloadJob::new(
                offer.url.clone(),
                artifact_file_name(&record.server_type, &name, &label),
            )
            .with_headers(offer.headers.clone())
            .with_display_name("server");

            match self.fetcher.fetch(job).await {
                DownloadOutcome::Completed(cached) => {
                    if let Err(err) = publish_artifact(&cached, &target).await {
                        cu_error!(context = ctx, "unable to replace server file: {}", err);
                        return None;
                    }
                    let hashes = fresh_hashes(&target, &ctx);
                    cu_info!(context = ctx, "server updated to {}", label);
                    if let Some(metrics) = &self.metrics {
                        metrics.record_update("server", &name);
                    }
                    return Some(ServerUpdateResult {
                        updater: name,
                        file: target,
                        build_number: offer.build_number,
                        hashes,
                    });
                }
                DownloadOutcome::Cancelled => return None,
                DownloadOutcome::Failed(err) => {
                    cu_warn!(context = ctx, "download failed, trying next updater: {}", err);
                    if let Some(metrics) = &self.metrics {
                        metrics.record_download_failure(&name);
                    }
                }
            }
        }
        None
    }

    async fn update_plugins(
        &self,
        manifest: &Manifest,
        settings: &Settings,
        folder: &Path,
    ) -> Vec<PluginUpdateResult> {
        let order = self.registry.plugin_update_order(&settings.update_order);
        let updater_settings = manifest.get("updater_settings").cloned().unwrap_or(Value::Null);
        let permits = Arc::new(Semaphore::new(self.config.workers.max(1)));
        let mut jobs = JoinSet::new();

        for record in PluginRecord::all(manifest) {
            if self.stop.is_set() {
                break;
            }
            let ctx = LogContext::new()
                .with_artifact(&record.name)
                .with_phase("plugin-update");
            if record.exclude {
                cu_info!(context = ctx, "excluded, skipping");
                continue;
            }
            let current = match record.file.as_deref() {
                Some(file) if folder.join(file).is_file() => folder.join(file),
                _ => {
                    cu_info!(context = ctx, "backing file is gone, skipping leftover record");
                    continue;
                }
            };
            let chain: Vec<Arc<dyn PluginUpdater>> = order
                .iter()
                .filter(|updater| record.section(&updater.descriptor().id).is_some())
                .cloned()
                .collect();
            if chain.is_empty() {
                cu_debug!(context = ctx, "no updater configured");
                continue;
            }

            let job = PluginJob {
                record,
                current,
                folder: folder.to_path_buf(),
                chain,
                updater_settings: updater_settings.clone(),
                fetcher: Arc::clone(&self.fetcher),
                inspector: Arc::clone(&self.inspector),
                stop: self.stop.clone(),
                metrics: self.metrics.clone(),
            };
            let permits = Arc::clone(&permits);
            jobs.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return None;
                };
                job.run().await
            });
        }

        let mut results = Vec::new();
        loop {
            match tokio::time::timeout(self.config.poll_interval, jobs.join_next()).await {
                Ok(Some(Ok(Some(result)))) => results.push(result),
                Ok(Some(Ok(None))) => {}
                Ok(Some(Err(err))) => {
                    cu_error!(
                        context = LogContext::new().with_phase("plugin-update"),
                        "plugin job aborted: {}",
                        err
                    );
                }
                Ok(None) => break,
                Err(_) => {
                    if self.stop.is_set() {
                        cu_debug!(
                            context = LogContext::new().with_phase("plugin-update"),
                            "stop requested, draining {} job(s)",
                            jobs.len()
                        );
                    }
                }
            }
        }
        results
    }

    fn record_updater_error(&self, updater: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_updater_error(updater);
        }
    }
}

/// Everything a plugin job needs, owned.
struct PluginJob {
    record: PluginRecord,
    current: PathBuf,
    folder: PathBuf,
    chain: Vec<Arc<dyn PluginUpdater>>,
    updater_settings: Value,
    fetcher: Arc<dyn ArtifactFetcher>,
    inspector: Arc<dyn ArtifactInspector>,
    stop: StopFlag,
    metrics: Option<UpdateMetrics>,
}

impl PluginJob {
    async fn run(self) -> Option<PluginUpdateResult> {
        if self.stop.is_set() {
            return None;
        }
        let hash = Arc::new(FileHash::with_known_hashes(
            &self.current,
            self.record.hashes.clone(),
        ));

        for updater in &self.chain {
            let descriptor = updater.descriptor();
            let ctx = LogContext::new()
                .with_artifact(&self.record.name)
                .with_updater(&descriptor.name)
                .with_phase("plugin-update");
            let query = PluginQuery {
                plugin_name: self.record.name.clone(),
                plugin_version: self.record.version.clone().unwrap_or_default(),
                file: self.current.clone(),
                hash: Arc::clone(&hash),
                config: self.record.section(&descriptor.id).cloned().unwrap_or(Value::Null),
                settings: self
                    .updater_settings
                    .get(descriptor.id.as_str())
                    .cloned()
                    .unwrap_or(Value::Null),
            };

            let offer = match guarded_check(updater.check_update(query), &self.stop).await {
                Checked::Offer(offer) => offer,
                Checked::Current => {
                    cu_debug!(context = ctx, "no update");
                    continue;
                }
                Checked::Failed(reason) => {
                    cu_error!(context = ctx, "update check failed: {}", reason);
                    if let Some(metrics) = &self.metrics {
                        metrics.record_updater_error(&descriptor.name);
                    }
                    continue;
                }
                Checked::Stopped => return None,
            };

            let label = offer
                .version
                .clone()
                .unwrap_or_else(|| UNKNOWN_VERSION.to_owned());
            let job = DownloadJob::new(
                offer.url.clone(),
                artifact_file_name(&self.record.name, &descriptor.name, &label),
            )
            .with_headers(offer.headers.clone())
            .with_display_name(self.record.name.clone());

            match self.fetcher.fetch(job).await {
                DownloadOutcome::Completed(cached) => {
                    return self.install(updater.as_ref(), offer, &cached, &ctx).await;
                }
                DownloadOutcome::Cancelled => return None,
                DownloadOutcome::Failed(err) => {
                    cu_warn!(context = ctx, "download failed, trying next updater: {}", err);
                    if let Some(metrics) = &self.metrics {
                        metrics.record_download_failure(&descriptor.name);
                    }
                }
            }
        }
        None
    }

    /// Move the download into the plugin folder and describe the result.
    async fn install(
        &self,
        updater: &dyn PluginUpdater,
        offer: UpdateOffer,
        cached: &Path,
        ctx: &LogContext<'_>,
    ) -> Option<PluginUpdateResult> {
        let descriptor = updater.descriptor();
        let version = match offer.version {
            Some(version) => version,
            None => match self.inspector.inspect(cached) {
                Ok(metadata) => metadata.version,
                Err(err) => {
                    cu_debug!(context = ctx, "no version in downloaded archive: {}", err);
                    UNKNOWN_VERSION.to_owned()
                }
            },
        };
        let file = artifact_file_name(&self.record.name, &descriptor.name, &version);
        let destination = self.folder.join(&file);

        if let Err(err) = publish_artifact(cached, &destination).await {
            cu_error!(context = ctx, "unable to install {}: {}", file, err);
            return None;
        }
        if destination != self.current {
            if let Err(err) = tokio::fs::remove_file(&self.current).await {
                cu_warn!(
                    context = ctx,
                    "unable to remove {}: {}",
                    self.current.display(),
                    err
                );
            }
        }

        let hashes = fresh_hashes(&destination, ctx);
        cu_info!(context = ctx, "updated to {} ({})", version, file);
        if let Some(metrics) = &self.metrics {
            metrics.record_update("plugin", &descriptor.name);
        }
        Some(PluginUpdateResult {
            plugin: self.record.name.clone(),
            updater_id: descriptor.id.clone(),
            updater_name: descriptor.name.clone(),
            file,
            version,
            hashes,
            plugin_config_updates: offer.plugin_config_updates,
            updater_config_updates: offer.updater_config_updates,
        })
    }
}

enum Checked {
    Offer(UpdateOffer),
    Current,
    Failed(String),
    Stopped,
}

/// Run one update check, containing errors and panics.
async fn guarded_check<F>(check: F, stop: &StopFlag) -> Checked
where
    F: Future<Output = std::result::Result<Option<UpdateOffer>, UpdaterError>>,
{
    if stop.is_set() {
        return Checked::Stopped;
    }
    tokio::select! {
        outcome = AssertUnwindSafe(check).catch_unwind() => match outcome {
            Ok(Ok(Some(offer))) => Checked::Offer(offer),
            Ok(Ok(None)) => Checked::Current,
            Ok(Err(err)) => Checked::Failed(err.to_string()),
            Err(panic) => Checked::Failed(format!("updater panicked: {}", panic_message(panic.as_ref()))),
        },
        _ = stop.wait() => Checked::Stopped,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}

/// `"<artifact> [<updater>] [<version>].jar"` with path separators and other
/// characters unsafe in file names replaced.
pub fn artifact_file_name(artifact: &str, updater: &str, version: &str) -> String {
    let raw = format!("{artifact} [{updater}] [{version}].jar");
    raw.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Digests standing in for a server file that does not exist yet, so that
/// digest comparisons always report a mismatch.
fn absent_hashes() -> ContentHashes {
    ContentHashes {
        md5: Some("0".repeat(32)),
        sha1: Some("0".repeat(40)),
        sha256: Some("0".repeat(64)),
        sha512: Some("0".repeat(128)),
    }
}

fn fresh_hashes(path: &Path, ctx: &LogContext<'_>) -> ContentHashes {
    match FileHash::new(path).hashes() {
        Ok(hashes) => hashes,
        Err(err) => {
            cu_warn!(context = ctx, "unable to hash {}: {}", path.display(), err);
            ContentHashes::default()
        }
    }
}

fn commit_server(manifest: &mut Manifest, result: &ServerUpdateResult) {
    if let Some(build) = result.build_number {
        manifest.put_at(&["server", "build_number"], build);
    }
    manifest.put_at(&["server", "hashes"], result.hashes.to_value());
}

fn commit_plugin(manifest: &mut Manifest, result: &PluginUpdateResult) {
    let name = result.plugin.as_str();
    manifest.put_at(&["plugins", name, "file"], result.file.as_str());
    manifest.put_at(&["plugins", name, "version"], result.version.as_str());
    manifest.put_at(&["plugins", name, "hashes"], result.hashes.to_value());

    let id = result.updater_id.as_str();
    for (key, value) in &result.plugin_config_updates {
        let mut path = vec!["plugins".to_owned(), name.to_owned(), id.to_owned()];
        path.extend(split(key.trim_matches('.')));
        manifest.set_at(&path, value.clone());
    }
    for (key, value) in &result.updater_config_updates {
        let mut path = vec!["updater_settings".to_owned(), id.to_owned()];
        path.extend(split(key.trim_matches('.')));
        manifest.set_at(&path, value.clone());
    }
    cu_debug!(
        context = LogContext::new().with_artifact(name).with_phase("commit"),
        "record updated to {}",
        result.file
    );
}
