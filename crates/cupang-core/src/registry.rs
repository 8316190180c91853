//! ---
//! cupang_section: "05-updater-registry"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Updater registration, ordering and defaults."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
use std::sync::Arc;

use cupang_logging::{cu_debug, cu_warn, LogContext};
use cupang_manifest::defaults::PLUGIN_RECORD;
use cupang_manifest::{FieldSpec, ManifestSchema, SchemaBuilder, Section};
use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};

use crate::error::RegistryError;
use crate::updater::{PluginUpdater, ServerUpdater};

/// Which default [`UpdaterRegistry::default_config_for`] should assemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKind {
    /// A complete plugin record: base keys plus one block per plugin updater.
    Plugin,
    /// The `updater_settings` section.
    UpdaterSettings,
}

struct RegisteredPlugin {
    updater: Arc<dyn PluginUpdater>,
    config_default: Section,
    settings_default: Option<Section>,
}

/// Holds every registered updater and the manifest schema they contribute.
///
/// Constructed once per run and populated before the manifest is loaded;
/// after that it is only read.
pub struct UpdaterRegistry {
    server_updaters: Vec<Arc<dyn ServerUpdater>>,
    plugin_updaters: IndexMap<String, RegisteredPlugin>,
    schema: SchemaBuilder,
    plugin_base: Section,
}

impl Default for UpdaterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UpdaterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdaterRegistry")
            .field(
                "server_updaters",
                &self
                    .server_updaters
                    .iter()
                    .map(|u| u.descriptor().name.as_str())
                    .collect::<Vec<_>>(),
            )
            .field("plugin_updaters", &self.plugin_updaters.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn invalid_id(id: &str) -> Option<&'static str> {
    if id.trim().is_empty() {
        Some("empty id")
    } else if id.chars().any(char::is_whitespace) {
        Some("id contains whitespace")
    } else if id.contains('.') {
        Some("id contains a dot")
    } else {
        None
    }
}

fn parse_default(
    updater: &str,
    what: &str,
    text: &str,
    schema: &FieldSpec,
) -> Result<Section, RegistryError> {
    let section = Section::parse(text)
        .map_err(|err| RegistryError::not_initialized(updater, format!("{what} does not parse: {err}")))?;
    FieldSpec::nullable(schema.clone())
        .validate(&section.value, &mut vec![updater.to_owned()])
        .map_err(|err| {
            RegistryError::not_initialized(updater, format!("{what} does not match its schema: {err}"))
        })?;
    Ok(section)
}

impl UpdaterRegistry {
    pub fn new() -> Self {
        Self {
            server_updaters: Vec::new(),
            plugin_updaters: IndexMap::new(),
            schema: SchemaBuilder::new(),
            plugin_base: Section::parse(PLUGIN_RECORD).unwrap_or_default(),
        }
    }

    /// Add a server updater. Several updaters may claim the same type; they
    /// are tried in registration order.
    pub fn register_server_updater(&mut self, updater: Arc<dyn ServerUpdater>) -> Result<(), RegistryError> {
        let descriptor = updater.descriptor();
        let name = descriptor.name.trim();
        if name.is_empty() {
            return Err(RegistryError::not_initialized("<unnamed>", "empty name"));
        }
        if descriptor.server_types.is_empty() {
            return Err(RegistryError::not_initialized(name, "no supported server types"));
        }
        if let Some(bad) = descriptor
            .server_types
            .iter()
            .find(|t| t.trim().is_empty() || t.chars().any(char::is_whitespace))
        {
            return Err(RegistryError::not_initialized(
                name,
                format!("invalid server type `{bad}`"),
            ));
        }
        if self
            .server_updaters
            .iter()
            .any(|existing| existing.descriptor().name == descriptor.name)
        {
            cu_warn!(
                context = LogContext::new().with_updater(name),
                "server updater already registered, ignoring"
            );
            return Ok(());
        }

        self.schema.add_server_types(&descriptor.server_types);
        cu_debug!(
            context = LogContext::new().with_updater(name),
            "server updater registered for {}",
            descriptor.server_types.join(", ")
        );
        self.server_updaters.push(updater);
        Ok(())
    }

    /// Add a plugin updater and its manifest sections.
    pub fn register_plugin_updater(&mut self, updater: Arc<dyn PluginUpdater>) -> Result<(), RegistryError> {
        let descriptor = updater.descriptor();
        let id = descriptor.id.as_str();
        if let Some(reason) = invalid_id(id) {
            return Err(RegistryError::not_initialized(
                if id.trim().is_empty() { descriptor.name.as_str() } else { id },
                reason,
            ));
        }
        if descriptor.name.trim().is_empty() {
            return Err(RegistryError::not_initialized(id, "empty name"));
        }
        if self.plugin_updaters.contains_key(id) {
            cu_warn!(
                context = LogContext::new().with_updater(id),
                "plugin updater already registered, ignoring"
            );
            return Ok(());
        }

        let config_default = parse_default(
            id,
            "plugin config default",
            &descriptor.config_default,
            &descriptor.config_schema,
        )?;
        let settings_default = match (&descriptor.settings_schema, &descriptor.settings_default) {
            (None, None) => None,
            (Some(schema), Some(text)) => Some(parse_default(id, "updater settings default", text, schema)?),
            (Some(_), None) => {
                return Err(RegistryError::not_initialized(
                    id,
                    "settings schema declared without a default",
                ))
            }
            (None, Some(_)) => {
                return Err(RegistryError::not_initialized(
                    id,
                    "settings default declared without a schema",
                ))
            }
        };

        self.schema
            .add_plugin_section(id, descriptor.config_schema.clone());
        if let Some(schema) = &descriptor.settings_schema {
            self.schema.add_updater_settings(id, schema.clone());
        }
        cu_debug!(
            context = LogContext::new().with_updater(id),
            "plugin updater `{}` registered",
            descriptor.name
        );
        self.plugin_updaters.insert(
            id.to_owned(),
            RegisteredPlugin {
                updater: Arc::clone(&updater),
                config_default,
                settings_default,
            },
        );
        Ok(())
    }

    /// Server updaters supporting `server_type`, in registration order.
    pub fn updaters_for_server_type(&self, server_type: &str) -> Vec<Arc<dyn ServerUpdater>> {
        let wanted = server_type.trim();
        self.server_updaters
            .iter()
            .filter(|updater| {
                updater
                    .descriptor()
                    .server_types
                    .iter()
                    .any(|t| t.eq_ignore_ascii_case(wanted))
            })
            .cloned()
            .collect()
    }

    pub fn updater_for_plugin_section(&self, id: &str) -> Option<Arc<dyn PluginUpdater>> {
        self.plugin_updaters.get(id).map(|entry| Arc::clone(&entry.updater))
    }

    /// Registered plugin updater ids in registration order.
    pub fn plugin_ids(&self) -> Vec<String> {
        self.plugin_updaters.keys().cloned().collect()
    }

    /// Resolve the user-configured order. Unknown and repeated ids are
    /// dropped; an empty list means registration order.
    pub fn plugin_update_order(&self, configured: &[String]) -> Vec<Arc<dyn PluginUpdater>> {
        if configured.is_empty() {
            return self
                .plugin_updaters
                .values()
                .map(|entry| Arc::clone(&entry.updater))
                .collect();
        }
        let mut seen = Vec::<&str>::new();
        let mut ordered = Vec::new();
        for id in configured {
            let id = id.trim();
            if seen.contains(&id) {
                continue;
            }
            seen.push(id);
            match self.updater_for_plugin_section(id) {
                Some(updater) => ordered.push(updater),
                None => cu_warn!(
                    context = LogContext::new().with_updater(id),
                    "update_order names an updater that is not registered, skipping"
                ),
            }
        }
        ordered
    }

    /// Deep copy of the requested default, with comments.
    pub fn default_config_for(&self, kind: ConfigKind) -> Section {
        let mut section = match kind {
            ConfigKind::Plugin => self.plugin_base.clone(),
            ConfigKind::UpdaterSettings => Section::new(Value::Mapping(Mapping::new())),
        };
        if !section.value.is_mapping() {
            section.value = Value::Mapping(Mapping::new());
        }
        for (id, entry) in &self.plugin_updaters {
            let source = match kind {
                ConfigKind::Plugin => Some(&entry.config_default),
                ConfigKind::UpdaterSettings => entry.settings_default.as_ref(),
            };
            let Some(source) = source else { continue };
            if let Some(map) = section.value.as_mapping_mut() {
                map.insert(Value::from(id.as_str()), source.value.clone());
            }
            section.comments.graft(&[id.as_str()], &source.comments);
        }
        section
    }

    /// Sorted, lowercase.
    pub fn supported_server_types(&self) -> Vec<String> {
        self.schema.server_types().map(str::to_owned).collect()
    }

    pub fn server_updaters(&self) -> &[Arc<dyn ServerUpdater>] {
        &self.server_updaters
    }

    /// Freeze the schema contributed so far.
    pub fn schema(&self) -> Arc<ManifestSchema> {
        self.schema.build()
    }
}
