//! ---
//! cupang_section: "04-inventory-scan"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Reconciles the plugin folder against the manifest."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
//! Inventory reconciliation.
//!
//! Records are keyed by the logical name found inside each archive, so a
//! renamed file keeps its record and a re-downloaded file with the same name
//! and md5 is left alone. All changes are collected on a copy of the
//! `plugins` mapping and written back in one batch, sorted by name.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cupang_logging::{cu_debug, cu_info, cu_warn, log_run_event, LogContext, RunEventOutcome};
use cupang_manifest::path::scalar_to_string;
use cupang_manifest::{merge_from_default, Manifest, MergeMutation, Section};
use serde_yaml::{Mapping, Value};
use walkdir::WalkDir;

use crate::error::{CoreError, Result};
use crate::hash::FileHash;
use crate::inspect::{ArtifactInspector, ArtifactMetadata};
use crate::records::{PluginRecord, Settings};
use crate::registry::{ConfigKind, UpdaterRegistry};
use crate::stop::StopFlag;

const ARCHIVE_EXTENSION: &str = "jar";

/// What a scan changed, by logical name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationReport {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
    pub unchanged: Vec<String>,
    /// Files that could not be read or carry no usable descriptor.
    pub skipped: Vec<PathBuf>,
    /// The stop flag was raised; nothing was written.
    pub cancelled: bool,
}

impl ReconciliationReport {
    pub fn is_new(&self, name: &str) -> bool {
        self.added.iter().any(|added| added == name)
    }

    fn summary(&self) -> String {
        format!(
            "{} added, {} updated, {} removed, {} unchanged, {} skipped",
            self.added.len(),
            self.updated.len(),
            self.removed.len(),
            self.unchanged.len(),
            self.skipped.len()
        )
    }
}

pub struct InventoryScanner {
    inspector: Arc<dyn ArtifactInspector>,
    registry: Arc<UpdaterRegistry>,
    cleanup: bool,
    stop: StopFlag,
}

impl InventoryScanner {
    pub fn new(inspector: Arc<dyn ArtifactInspector>, registry: Arc<UpdaterRegistry>) -> Self {
        Self {
            inspector,
            registry,
            cleanup: true,
            stop: StopFlag::new(),
        }
    }

    /// Remove record keys the current defaults no longer know about.
    pub fn with_cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn with_stop_flag(mut self, stop: StopFlag) -> Self {
        self.stop = stop;
        self
    }

    pub fn scan(&self, manifest: &mut Manifest) -> Result<ReconciliationReport> {
        let settings = Settings::from_manifest(manifest);
        let folder = settings.plugins_folder().ok_or(CoreError::ServerFolderUnset)?;
        if !folder.is_dir() {
            log_run_event(
                Some(&LogContext::new().with_phase("scan")),
                "scan.failed",
                &format!("plugin folder {} does not exist", folder.display()),
                RunEventOutcome::Fault,
            );
            return Err(CoreError::FolderNotFound(folder));
        }

        let defaults = self.registry.default_config_for(ConfigKind::Plugin);
        let mut plugins = manifest
            .get("plugins")
            .and_then(Value::as_mapping)
            .cloned()
            .unwrap_or_default();
        let mut report = ReconciliationReport::default();

        for path in archives_in(&folder) {
            if self.stop.is_set() {
                cu_warn!(context = LogContext::new().with_phase("scan"), "scan interrupted");
                report.cancelled = true;
                return Ok(report);
            }
            self.reconcile_file(&path, &defaults, &mut plugins, manifest, &mut report);
        }

        if !settings.keep_removed_plugins {
            self.drop_missing(&folder, &mut plugins, manifest, &mut report);
        }

        self.backfill(&defaults, &mut plugins, manifest);

        let mut entries: Vec<(Value, Value)> = plugins.into_iter().collect();
        entries.sort_by_cached_key(|(name, _)| scalar_to_string(name).unwrap_or_default().to_lowercase());
        manifest.put_at(&["plugins"], Value::Mapping(entries.into_iter().collect::<Mapping>()));
        manifest.save()?;

        log_run_event(
            Some(&LogContext::new().with_phase("scan")),
            "scan.finished",
            &report.summary(),
            RunEventOutcome::Success,
        );
        Ok(report)
    }

    fn reconcile_file(
        &self,
        path: &Path,
        defaults: &Section,
        plugins: &mut Mapping,
        manifest: &mut Manifest,
        report: &mut ReconciliationReport,
    ) {
        let file_name = match path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => return,
        };
        let ctx = LogContext::new().with_artifact(&file_name).with_phase("scan");

        let ArtifactMetadata { name, version, authors } = match self.inspector.inspect(path) {
            Ok(metadata) => metadata,
            Err(err) => {
                cu_warn!(context = ctx, "skipping archive: {}", err);
                report.skipped.push(path.to_path_buf());
                return;
            }
        };
        let hashes = match FileHash::new(path).hashes() {
            Ok(hashes) => hashes,
            Err(err) => {
                cu_warn!(context = ctx, "skipping unreadable archive: {}", err);
                report.skipped.push(path.to_path_buf());
                return;
            }
        };

        let existing = plugins.get(name.as_str()).filter(|value| value.is_mapping());
        if let Some(existing) = existing {
            let record = PluginRecord::from_value(&name, existing);
            if record.hashes.md5.is_some()
                && record.hashes.md5 == hashes.md5
                && record.file.as_deref() == Some(file_name.as_str())
            {
                report.unchanged.push(name);
                return;
            }
        }

        let is_new = existing.is_none();
        let mut record = match existing {
            Some(existing) => existing.clone(),
            None => {
                manifest.comments_mut().graft(&["plugins", name.as_str()], &defaults.comments);
                defaults.value.clone()
            }
        };
        if let Some(map) = record.as_mapping_mut() {
            map.insert("file".into(), Value::from(file_name.as_str()));
            map.insert("version".into(), Value::from(version.as_str()));
            map.insert(
                "authors".into(),
                if authors.is_empty() {
                    Value::Null
                } else {
                    Value::Sequence(authors.into_iter().map(Value::from).collect())
                },
            );
            map.insert("hashes".into(), hashes.to_value());
        }
        plugins.insert(Value::from(name.as_str()), record);

        let ctx = LogContext::new().with_artifact(&name).with_phase("scan");
        if is_new {
            cu_info!(context = ctx, "new plugin {} {}", file_name, version);
            report.added.push(name);
        } else {
            cu_info!(context = ctx, "record refreshed from {} {}", file_name, version);
            report.updated.push(name);
        }
    }

    fn drop_missing(
        &self,
        folder: &Path,
        plugins: &mut Mapping,
        manifest: &mut Manifest,
        report: &mut ReconciliationReport,
    ) {
        let missing: Vec<String> = plugins
            .iter()
            .filter_map(|(name, value)| {
                let name = scalar_to_string(name)?;
                let record = PluginRecord::from_value(&name, value);
                let present = record
                    .file
                    .as_deref()
                    .map(|file| folder.join(file).is_file())
                    .unwrap_or(false);
                (!present).then_some(name)
            })
            .collect();
        for name in missing {
            plugins.shift_remove(name.as_str());
            manifest.comments_mut().remove_subtree(&["plugins", name.as_str()]);
            cu_info!(
                context = LogContext::new().with_artifact(&name).with_phase("scan"),
                "backing file is gone, record removed"
            );
            report.removed.push(name);
        }
    }

    fn backfill(&self, defaults: &Section, plugins: &mut Mapping, manifest: &mut Manifest) {
        for (name, record) in plugins.iter_mut() {
            let Some(name) = scalar_to_string(name) else { continue };
            let mutations = merge_from_default(record, &defaults.value, self.cleanup);
            if mutations.is_empty() {
                continue;
            }
            let ctx = LogContext::new().with_artifact(&name).with_phase("scan");
            for mutation in &mutations {
                cu_debug!(context = ctx, "{}", mutation);
                if let MergeMutation::Removed(key) = mutation {
                    manifest
                        .comments_mut()
                        .remove_subtree(&["plugins", name.as_str(), key.as_str()]);
                }
            }
            if mutations.iter().any(|m| matches!(m, MergeMutation::Added(_))) {
                manifest.comments_mut().graft(&["plugins", name.as_str()], &defaults.comments);
            }
        }
    }
}

/// `*.jar` directly inside `folder`, in file-name order.
fn archives_in(folder: &Path) -> Vec<PathBuf> {
    WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                cu_warn!(context = LogContext::new().with_phase("scan"), "unable to list entry: {}", err);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some(ARCHIVE_EXTENSION))
        .collect()
}
