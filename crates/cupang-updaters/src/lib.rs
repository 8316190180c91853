//! ---
//! cupang_section: "08-release-sources"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Built-in release source updaters."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
//! Release sources shipped with cupang-updater.
//!
//! Every updater talks to its API through a shared [`ReleaseClient`] and
//! reports through the capability traits in `cupang-core`. API base URLs
//! can be overridden for tests and mirrors.

pub mod http;
pub mod plugin;
pub mod server;

use std::sync::Arc;

use cupang_core::{RegistryError, UpdaterRegistry};

pub use http::{make_url, ReleaseClient, ARCHIVE_TYPES};
pub use plugin::{BukkitUpdater, CustomUrlUpdater, GithubUpdater, JenkinsUpdater, ModrinthUpdater, SpigotUpdater};
pub use server::{PaperUpdater, PurpurUpdater, ServerjarsUpdater};

/// Register every built-in updater. Server updaters are tried in registration
/// order, so Serverjars goes first; plugin updaters are registered in the
/// default `settings.update_order`.
pub fn register_builtin(registry: &mut UpdaterRegistry, client: &ReleaseClient) -> Result<(), RegistryError> {
    registry.register_server_updater(Arc::new(ServerjarsUpdater::new(client.clone())))?;
    registry.register_server_updater(Arc::new(PaperUpdater::new(client.clone())))?;
    registry.register_server_updater(Arc::new(PurpurUpdater::new(client.clone())))?;

    registry.register_plugin_updater(Arc::new(CustomUrlUpdater::new(client.clone())))?;
    registry.register_plugin_updater(Arc::new(BukkitUpdater::new(client.clone())))?;
    registry.register_plugin_updater(Arc::new(SpigotUpdater::new(client.clone())))?;
    registry.register_plugin_updater(Arc::new(ModrinthUpdater::new(client.clone())))?;
    registry.register_plugin_updater(Arc::new(GithubUpdater::new(client.clone())))?;
    registry.register_plugin_updater(Arc::new(JenkinsUpdater::new(client.clone())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cupang_core::ConfigKind;

    #[test]
    fn builtin_updaters_register_cleanly() {
        let client = ReleaseClient::new("Cupang-Updater/test").unwrap();
        let mut registry = UpdaterRegistry::new();
        register_builtin(&mut registry, &client).unwrap();

        assert_eq!(
            registry.plugin_ids(),
            vec!["custom_url", "bukkit", "spigot", "modrinth", "github", "jenkins"]
        );
        assert_eq!(
            registry.supported_server_types(),
            vec!["bungeecord", "paper", "purpur", "velocity", "waterfall"]
        );
        let purpur: Vec<String> = registry
            .updaters_for_server_type("purpur")
            .iter()
            .map(|updater| updater.descriptor().name.clone())
            .collect();
        assert_eq!(purpur, vec!["Serverjars", "PurpurMC"]);

        let settings = registry.default_config_for(ConfigKind::UpdaterSettings);
        let token = settings
            .value
            .get("github")
            .and_then(|github| github.get("github_token"));
        assert_eq!(token, Some(&serde_yaml::Value::Null));
        let record = registry.default_config_for(ConfigKind::Plugin);
        assert_eq!(
            record.value["github"]["compare_to"],
            serde_yaml::Value::from("commit")
        );
        assert!(record.value["bukkit"]["project_id"].is_null());
        assert_eq!(
            record.comments.inline(&["spigot", "resource_id"]),
            Some("number in the spigotmc url, 18494 for spigotmc.org/resources/discordsrv.18494")
        );
    }
}
