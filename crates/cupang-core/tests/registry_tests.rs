//! ---
//! cupang_section: "05-updater-registry"
//! cupang_subsection: "tests"
//! cupang_type: "source"
//! cupang_scope: "test"
//! cupang_description: "Registration rules, ordering, defaults and manifest bootstrap."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
mod support;

use std::sync::Arc;

use async_trait::async_trait;
use cupang_core::{
    prepare_manifest, set_server_folder, ConfigKind, CoreError, PluginQuery, PluginUpdater,
    PluginUpdaterDescriptor, RegistryError, UpdateOffer, UpdaterError, UpdaterRegistry,
};
use cupang_manifest::{FieldSpec, Manifest, MapSpec};
use serde_yaml::Value;
use support::{Behaviour, FakePluginUpdater, FakeServerUpdater};

struct Described(PluginUpdaterDescriptor);

#[async_trait]
impl PluginUpdater for Described {
    fn descriptor(&self) -> &PluginUpdaterDescriptor {
        &self.0
    }

    async fn check_update(&self, _query: PluginQuery) -> Result<Option<UpdateOffer>, UpdaterError> {
        Ok(None)
    }
}

fn descriptor(id: &str) -> PluginUpdaterDescriptor {
    PluginUpdaterDescriptor {
        id: id.to_owned(),
        name: "Example".to_owned(),
        config_schema: MapSpec::new()
            .required("resource_id", FieldSpec::nullable(FieldSpec::Int))
            .into(),
        config_default: "resource_id: # numeric id\n".to_owned(),
        settings_schema: None,
        settings_default: None,
    }
}

fn rejected(descriptor: PluginUpdaterDescriptor) -> String {
    let mut registry = UpdaterRegistry::new();
    match registry.register_plugin_updater(Arc::new(Described(descriptor))) {
        Err(RegistryError::NotInitialized { reason, .. }) => reason,
        Ok(()) => panic!("registration should fail"),
    }
}

#[test]
fn incomplete_plugin_updaters_are_rejected() {
    assert_eq!(rejected(descriptor("")), "empty id");
    assert_eq!(rejected(descriptor("two words")), "id contains whitespace");
    assert_eq!(rejected(descriptor("a.b")), "id contains a dot");

    let mut nameless = descriptor("nameless");
    nameless.name = " ".to_owned();
    assert_eq!(rejected(nameless), "empty name");

    let mut bad_default = descriptor("bad");
    bad_default.config_default = "resource_id: abc\n".to_owned();
    assert!(rejected(bad_default).contains("does not match its schema"));

    let mut unparsable = descriptor("broken");
    unparsable.config_default = "resource_id: [unterminated\n".to_owned();
    assert!(rejected(unparsable).contains("does not parse"));

    let mut half_settings = descriptor("half");
    half_settings.settings_schema = Some(FieldSpec::Any);
    assert_eq!(
        rejected(half_settings),
        "settings schema declared without a default"
    );
}

#[test]
fn server_updaters_need_types() {
    let mut registry = UpdaterRegistry::new();
    assert!(registry
        .register_server_updater(FakeServerUpdater::new("none", &[], None))
        .is_err());
    assert!(registry
        .register_server_updater(FakeServerUpdater::new("spaced", &["pa per"], None))
        .is_err());
    registry
        .register_server_updater(FakeServerUpdater::new("paper", &["paper", "waterfall"], None))
        .unwrap();
    registry
        .register_server_updater(FakeServerUpdater::new("mirror", &["Paper"], None))
        .unwrap();

    let names: Vec<_> = registry
        .updaters_for_server_type("PAPER")
        .iter()
        .map(|u| u.descriptor().name.clone())
        .collect();
    assert_eq!(names, vec!["paper", "mirror"]);
    assert_eq!(registry.supported_server_types(), vec!["paper", "waterfall"]);
}

#[test]
fn duplicate_registration_is_ignored() {
    let mut registry = UpdaterRegistry::new();
    let first = FakePluginUpdater::new("spigot", "First", Behaviour::NoUpdate);
    let second = FakePluginUpdater::new("spigot", "Second", Behaviour::NoUpdate);
    registry.register_plugin_updater(first).unwrap();
    registry.register_plugin_updater(second).unwrap();
    assert_eq!(registry.plugin_ids(), vec!["spigot"]);
    assert_eq!(
        registry
            .updater_for_plugin_section("spigot")
            .unwrap()
            .descriptor()
            .name,
        "First"
    );
}

#[test]
fn update_order_drops_unknown_and_repeated_ids() {
    let mut registry = UpdaterRegistry::new();
    for id in ["a", "b", "c"] {
        registry
            .register_plugin_updater(FakePluginUpdater::new(id, id, Behaviour::NoUpdate))
            .unwrap();
    }
    let ids = |order: &[&str]| -> Vec<String> {
        let configured: Vec<String> = order.iter().map(|s| s.to_string()).collect();
        registry
            .plugin_update_order(&configured)
            .iter()
            .map(|u| u.descriptor().id.clone())
            .collect()
    };
    assert_eq!(ids(&[]), vec!["a", "b", "c"]);
    assert_eq!(ids(&["c", "missing", "a", "c"]), vec!["c", "a"]);
}

#[test]
fn plugin_default_combines_base_record_and_sections() {
    let mut registry = UpdaterRegistry::new();
    registry
        .register_plugin_updater(Arc::new(Described(descriptor("spigot"))))
        .unwrap();
    let section = registry.default_config_for(ConfigKind::Plugin);

    let keys: Vec<_> = section
        .value
        .as_mapping()
        .unwrap()
        .keys()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(
        keys,
        vec!["exclude", "file", "version", "authors", "hashes", "spigot"]
    );
    assert_eq!(
        section.comments.inline(&["spigot", "resource_id"]),
        Some("numeric id")
    );
    assert_eq!(
        section.comments.inline(&["exclude"]),
        Some("exclude plugin from update checker")
    );

    let settings = registry.default_config_for(ConfigKind::UpdaterSettings);
    assert_eq!(settings.value.as_mapping().map(|m| m.len()), Some(0));
}

#[test]
fn bootstrap_aligns_manifest_with_registry() {
    let mut registry = UpdaterRegistry::new();
    registry
        .register_server_updater(FakeServerUpdater::new("purpur", &["purpur"], None))
        .unwrap();
    registry
        .register_server_updater(FakeServerUpdater::new("paper", &["paper"], None))
        .unwrap();
    registry
        .register_plugin_updater(FakePluginUpdater::with_settings("github", "GitHub", "token: # personal access token\n"))
        .unwrap();
    registry
        .register_plugin_updater(FakePluginUpdater::new("spigot", "Spigot", Behaviour::NoUpdate))
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    let mut manifest = Manifest::create_default(&path, registry.schema()).unwrap();
    manifest.put_at(
        &["settings", "update_order"],
        serde_yaml::from_str::<Value>("[spigot]").unwrap(),
    );

    assert!(prepare_manifest(&mut manifest, &registry));
    assert_eq!(
        manifest.get("settings.update_order"),
        Some(&serde_yaml::from_str::<Value>("[spigot, github]").unwrap())
    );
    assert!(manifest.get_at(&["updater_settings", "github"]).is_some());
    assert!(!prepare_manifest(&mut manifest, &registry));

    manifest.save().unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("type: purpur # one of these: paper, purpur"), "{text}");
    assert!(text.contains("token: # personal access token"), "{text}");
    Manifest::load(&path, registry.schema()).unwrap();
}

#[test]
fn server_folder_must_be_absolute() {
    let dir = tempfile::tempdir().unwrap();
    let registry = UpdaterRegistry::new();
    let mut manifest =
        Manifest::create_default(dir.path().join("config.yaml"), registry.schema()).unwrap();
    assert!(matches!(
        set_server_folder(&mut manifest, std::path::Path::new("relative/server")),
        Err(CoreError::InvalidServerFolder(_))
    ));
    set_server_folder(&mut manifest, dir.path()).unwrap();
    assert_eq!(
        manifest.get_str("settings.server_folder"),
        Some(dir.path().to_string_lossy().into_owned())
    );
}
