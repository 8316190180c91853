//! ---
//! cupang_section: "05-updater-registry"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Aligns a loaded manifest with the registered updaters."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
use std::path::Path;

use cupang_logging::{cu_info, LogContext};
use cupang_manifest::path::scalar_to_string;
use cupang_manifest::{merge_from_default, Manifest, MergeMutation};
use serde_yaml::{Mapping, Value};

use crate::error::{CoreError, Result};
use crate::registry::{ConfigKind, UpdaterRegistry};

/// Bring the manifest in line with the registry.
///
/// Newly registered plugin updater ids are appended to
/// `settings.update_order`, missing `updater_settings.<id>` blocks are
/// backfilled with their defaults and the `server.type` comment lists the
/// supported types. Returns whether the document changed.
pub fn prepare_manifest(manifest: &mut Manifest, registry: &UpdaterRegistry) -> bool {
    let mut changed = append_update_order(manifest, registry);
    changed |= backfill_updater_settings(manifest, registry);
    annotate_server_types(manifest, registry);
    changed
}

fn append_update_order(manifest: &mut Manifest, registry: &UpdaterRegistry) -> bool {
    let mut order: Vec<String> = match manifest.get("settings.update_order") {
        Some(Value::Sequence(items)) => items.iter().filter_map(scalar_to_string).collect(),
        _ => Vec::new(),
    };
    let missing: Vec<String> = registry
        .plugin_ids()
        .into_iter()
        .filter(|id| !order.contains(id))
        .collect();
    if missing.is_empty() {
        return false;
    }
    cu_info!(
        context = LogContext::new().with_phase("bootstrap"),
        "adding {} to settings.update_order",
        missing.join(", ")
    );
    order.extend(missing);
    manifest.put_at(
        &["settings", "update_order"],
        Value::Sequence(order.into_iter().map(Value::from).collect()),
    );
    true
}

fn backfill_updater_settings(manifest: &mut Manifest, registry: &UpdaterRegistry) -> bool {
    let defaults = registry.default_config_for(ConfigKind::UpdaterSettings);
    let mut settings = match manifest.get("updater_settings") {
        Some(value) if value.is_mapping() => value.clone(),
        _ => Value::Mapping(Mapping::new()),
    };
    let added: Vec<String> = merge_from_default(&mut settings, &defaults.value, false)
        .into_iter()
        .filter_map(|mutation| match mutation {
            MergeMutation::Added(key) => Some(key),
            MergeMutation::Removed(_) => None,
        })
        .collect();
    if added.is_empty() {
        return false;
    }
    for id in &added {
        cu_info!(
            context = LogContext::new().with_updater(id).with_phase("bootstrap"),
            "default updater settings added"
        );
    }
    manifest.comments_mut().graft(&["updater_settings"], &defaults.comments);
    manifest.put_at(&["updater_settings"], settings);
    true
}

fn annotate_server_types(manifest: &mut Manifest, registry: &UpdaterRegistry) {
    let types = registry.supported_server_types();
    if types.is_empty() {
        return;
    }
    manifest
        .comments_mut()
        .set_inline(&["server", "type"], format!("one of these: {}", types.join(", ")));
}

/// Store an absolute server folder in `settings.server_folder`.
pub fn set_server_folder(manifest: &mut Manifest, folder: &Path) -> Result<()> {
    if !folder.is_absolute() {
        return Err(CoreError::InvalidServerFolder(folder.to_path_buf()));
    }
    manifest.put_at(
        &["settings", "server_folder"],
        Value::from(folder.to_string_lossy().into_owned()),
    );
    Ok(())
}
