//! ---
//! cupang_section: "04-inventory-scan"
//! cupang_subsection: "tests"
//! cupang_type: "source"
//! cupang_scope: "test"
//! cupang_description: "Inventory reconciliation against a real plugin folder."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
mod support;

use std::fs;
use std::sync::Arc;

use cupang_core::{
    CoreError, FileHash, InventoryScanner, JarInspector, StopFlag, UpdaterRegistry,
};
use serde_yaml::Value;
use support::{write_jar, write_plugin, Behaviour, FakePluginUpdater, Harness};

fn registry() -> UpdaterRegistry {
    let mut registry = UpdaterRegistry::new();
    registry
        .register_plugin_updater(FakePluginUpdater::with_settings("spigot", "Spigot", "token:\n"))
        .unwrap();
    registry
        .register_plugin_updater(FakePluginUpdater::new("github", "GitHub", Behaviour::NoUpdate))
        .unwrap();
    registry
}

fn scanner(harness: &Harness) -> InventoryScanner {
    InventoryScanner::new(Arc::new(JarInspector), Arc::clone(&harness.registry))
}

#[test]
fn new_plugin_gets_identity_and_default_sections() {
    let mut harness = Harness::new(registry());
    let jar = write_plugin(&harness.plugins, "Foo-1.0.jar", "Foo", "1.0");

    let report = scanner(&harness).scan(&mut harness.manifest).unwrap();
    assert_eq!(report.added, vec!["Foo"]);
    assert!(report.is_new("Foo"));

    let record = harness.record("Foo");
    assert_eq!(record.file.as_deref(), Some("Foo-1.0.jar"));
    assert_eq!(record.version.as_deref(), Some("1.0"));
    assert_eq!(record.hashes, FileHash::new(&jar).hashes().unwrap());
    assert!(record.hashes.is_complete());
    assert_eq!(
        harness.manifest.get_at(&["plugins", "Foo", "spigot"]),
        Some(&serde_yaml::from_str::<Value>("resource_id:").unwrap())
    );
    assert!(record.raw.get("github").is_some());

    let saved = fs::read_to_string(harness.manifest.path()).unwrap();
    assert!(saved.contains("exclude: false # exclude plugin from update checker"), "{saved}");
    assert!(saved.contains("resource_id: # numeric id"), "{saved}");
}

#[test]
fn unchanged_file_is_left_alone() {
    let mut harness = Harness::new(registry());
    write_plugin(&harness.plugins, "Foo.jar", "Foo", "1.0");
    scanner(&harness).scan(&mut harness.manifest).unwrap();
    harness
        .manifest
        .put_at(&["plugins", "Foo", "version"], "edited-by-hand");

    let report = scanner(&harness).scan(&mut harness.manifest).unwrap();
    assert_eq!(report.unchanged, vec!["Foo"]);
    assert!(report.added.is_empty() && report.updated.is_empty());
    assert_eq!(harness.record("Foo").version.as_deref(), Some("edited-by-hand"));
}

#[test]
fn renamed_file_keeps_record_and_is_not_new() {
    let mut harness = Harness::new(registry());
    write_plugin(&harness.plugins, "Foo.jar", "Foo", "1.0");
    scanner(&harness).scan(&mut harness.manifest).unwrap();
    harness
        .manifest
        .put_at(&["plugins", "Foo", "spigot", "resource_id"], 42);

    fs::remove_file(harness.plugins.join("Foo.jar")).unwrap();
    write_plugin(&harness.plugins, "Foo [Spigot] [1.1].jar", "Foo", "1.1");
    let report = scanner(&harness).scan(&mut harness.manifest).unwrap();

    assert_eq!(report.updated, vec!["Foo"]);
    assert!(!report.is_new("Foo"));
    let record = harness.record("Foo");
    assert_eq!(record.file.as_deref(), Some("Foo [Spigot] [1.1].jar"));
    assert_eq!(record.version.as_deref(), Some("1.1"));
    assert_eq!(
        harness.manifest.get_at(&["plugins", "Foo", "spigot", "resource_id"]),
        Some(&Value::from(42))
    );
}

#[test]
fn changed_content_under_same_file_name_refreshes_identity() {
    let mut harness = Harness::new(registry());
    write_plugin(&harness.plugins, "Foo.jar", "Foo", "1.0");
    scanner(&harness).scan(&mut harness.manifest).unwrap();
    let stale: Value =
        serde_yaml::from_str("md5: aaa\nsha1: aaa\nsha256: aaa\nsha512: aaa\n").unwrap();
    harness.manifest.put_at(&["plugins", "Foo", "hashes"], stale);

    let jar = harness.plugins.join("Foo.jar");
    write_jar(
        &jar,
        &[("plugin.yml", "name: Foo\nversion: '2.0'\nauthors: [alice, bob]\n")],
    );
    let report = scanner(&harness).scan(&mut harness.manifest).unwrap();

    assert_eq!(report.updated, vec!["Foo"]);
    assert!(!report.is_new("Foo"));
    let record = harness.record("Foo");
    assert_eq!(record.file.as_deref(), Some("Foo.jar"));
    assert_eq!(record.version.as_deref(), Some("2.0"));
    assert_eq!(record.authors, vec!["alice", "bob"]);
    let on_disk = FileHash::new(&jar).hashes().unwrap();
    assert_eq!(record.hashes, on_disk);
    for digest in [
        &record.hashes.md5,
        &record.hashes.sha1,
        &record.hashes.sha256,
        &record.hashes.sha512,
    ] {
        assert_ne!(digest.as_deref(), Some("aaa"));
    }
}

#[test]
fn removed_plugins_follow_retention_setting() {
    let mut harness = Harness::new(registry());
    write_plugin(&harness.plugins, "Bar.jar", "Bar", "1.0");
    scanner(&harness).scan(&mut harness.manifest).unwrap();
    fs::remove_file(harness.plugins.join("Bar.jar")).unwrap();

    let report = scanner(&harness).scan(&mut harness.manifest).unwrap();
    assert!(report.removed.is_empty());
    assert_eq!(harness.plugin_names(), vec!["Bar"]);

    harness
        .manifest
        .put_at(&["settings", "keep_removed_plugins"], false);
    let report = scanner(&harness).scan(&mut harness.manifest).unwrap();
    assert_eq!(report.removed, vec!["Bar"]);
    assert!(harness.plugin_names().is_empty());
}

#[test]
fn unreadable_archives_are_skipped() {
    let mut harness = Harness::new(registry());
    fs::write(harness.plugins.join("broken.jar"), b"definitely not a zip").unwrap();
    write_plugin(&harness.plugins, "Foo.jar", "Foo", "1.0");
    fs::write(harness.plugins.join("readme.txt"), b"ignored").unwrap();

    let report = scanner(&harness).scan(&mut harness.manifest).unwrap();
    assert_eq!(report.skipped, vec![harness.plugins.join("broken.jar")]);
    assert_eq!(report.added, vec!["Foo"]);
}

#[test]
fn records_are_sorted_case_insensitively() {
    let mut harness = Harness::new(registry());
    write_plugin(&harness.plugins, "b.jar", "beta", "1");
    write_plugin(&harness.plugins, "a.jar", "Charlie", "1");
    write_plugin(&harness.plugins, "c.jar", "Alpha", "1");

    scanner(&harness).scan(&mut harness.manifest).unwrap();
    assert_eq!(harness.plugin_names(), vec!["Alpha", "beta", "Charlie"]);
}

#[test]
fn cleanup_controls_unknown_keys() {
    let mut harness = Harness::new(registry());
    write_plugin(&harness.plugins, "Foo.jar", "Foo", "1.0");
    scanner(&harness).scan(&mut harness.manifest).unwrap();
    harness.manifest.put_at(&["plugins", "Foo", "legacy"], "kept?");

    scanner(&harness)
        .with_cleanup(false)
        .scan(&mut harness.manifest)
        .unwrap();
    assert!(harness.manifest.get_at(&["plugins", "Foo", "legacy"]).is_some());

    scanner(&harness).scan(&mut harness.manifest).unwrap();
    assert!(harness.manifest.get_at(&["plugins", "Foo", "legacy"]).is_none());
}

#[test]
fn cleanup_keeps_remaining_record_keys_in_place() {
    let mut harness = Harness::new(registry());
    write_plugin(&harness.plugins, "Foo.jar", "Foo", "1.0");
    scanner(&harness).scan(&mut harness.manifest).unwrap();
    let keys = |harness: &Harness| -> Vec<String> {
        harness
            .manifest
            .get_at(&["plugins", "Foo"])
            .and_then(Value::as_mapping)
            .map(|record| {
                record
                    .keys()
                    .filter_map(|key| key.as_str().map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default()
    };
    let before = keys(&harness);
    assert!(before.len() > 3, "{before:?}");

    let mut with_legacy = serde_yaml::Mapping::new();
    if let Some(record) = harness.manifest.get_at(&["plugins", "Foo"]).and_then(Value::as_mapping) {
        for (idx, (key, value)) in record.iter().enumerate() {
            with_legacy.insert(key.clone(), value.clone());
            if idx == 0 {
                with_legacy.insert(Value::from("legacy"), Value::from("dropped"));
            }
        }
    }
    harness
        .manifest
        .put_at(&["plugins", "Foo"], Value::Mapping(with_legacy));

    scanner(&harness).scan(&mut harness.manifest).unwrap();
    assert!(harness.manifest.get_at(&["plugins", "Foo", "legacy"]).is_none());
    assert_eq!(keys(&harness), before);
}

#[test]
fn missing_plugin_folder_is_fatal() {
    let mut harness = Harness::new(registry());
    fs::remove_dir_all(&harness.plugins).unwrap();
    let err = scanner(&harness).scan(&mut harness.manifest).unwrap_err();
    assert!(matches!(err, CoreError::FolderNotFound(path) if path == harness.plugins));
}

#[test]
fn raised_stop_flag_writes_nothing() {
    let mut harness = Harness::new(registry());
    write_plugin(&harness.plugins, "Foo.jar", "Foo", "1.0");
    let before = fs::read_to_string(harness.manifest.path()).unwrap();

    let stop = StopFlag::new();
    stop.stop();
    let report = scanner(&harness)
        .with_stop_flag(stop)
        .scan(&mut harness.manifest)
        .unwrap();
    assert!(report.cancelled);
    assert_eq!(fs::read_to_string(harness.manifest.path()).unwrap(), before);
}
