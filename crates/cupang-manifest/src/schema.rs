//! ---
//! cupang_section: "03-manifest-store"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Key-path addressable manifest store."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
//! Manifest schema.
//!
//! The fixed `settings` and `server` sections are always present. The rest
//! grows while updaters register: each plugin updater adds a sub-key to every
//! plugin record, may add a block under `updater_settings`, and each server
//! updater widens the accepted `server.type` values. The builder is frozen
//! into an immutable [`ManifestSchema`] before the manifest is loaded.

use std::collections::BTreeSet;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_yaml::Value;
use tracing::debug;

use crate::path::{join, scalar_to_string};
use crate::timestamp::parse_timestamp;
use crate::{ManifestError, Result};

/// Shape accepted at one position of the document.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldSpec {
    Any,
    /// A string, or an integer that will be read back as its text. Decimal
    /// numbers must be quoted.
    Str,
    NonEmptyStr,
    Int,
    Bool,
    /// RFC 3339 (or the legacy space-separated form).
    Timestamp,
    /// Absolute `http`/`https` URL.
    Url,
    StrList,
    /// Case-insensitive choice. An empty list accepts any non-empty string.
    OneOf(Vec<String>),
    Nullable(Box<FieldSpec>),
    Map(MapSpec),
    /// Mapping with arbitrary keys, every value of the same shape.
    MapOf(Box<FieldSpec>),
}

impl FieldSpec {
    pub fn nullable(inner: FieldSpec) -> Self {
        FieldSpec::Nullable(Box::new(inner))
    }

    pub fn map_of(inner: FieldSpec) -> Self {
        FieldSpec::MapOf(Box::new(inner))
    }

    /// Check `value` and report the first mismatch with its dotted location.
    pub fn validate(&self, value: &Value, path: &mut Vec<String>) -> Result<()> {
        let mismatch = |expected: &str, path: &[String]| {
            Err(ManifestError::validation(
                display_path(path),
                format!("expected {expected}, found {}", describe(value)),
            ))
        };

        match self {
            FieldSpec::Any => Ok(()),
            FieldSpec::Str => match value {
                Value::Number(n) if n.is_f64() => mismatch(QUOTED_DECIMAL, path),
                Value::String(_) | Value::Number(_) => Ok(()),
                _ => mismatch("a string", path),
            },
            FieldSpec::NonEmptyStr => match value {
                Value::Number(n) if n.is_f64() => mismatch(QUOTED_DECIMAL, path),
                _ => match scalar_text(value) {
                    Some(text) if !text.trim().is_empty() => Ok(()),
                    _ => mismatch("a non-empty string", path),
                },
            },
            FieldSpec::Int => match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => Ok(()),
                _ => mismatch("an integer", path),
            },
            FieldSpec::Bool => match value {
                Value::Bool(_) => Ok(()),
                _ => mismatch("a boolean", path),
            },
            FieldSpec::Timestamp => match value.as_str().and_then(parse_timestamp) {
                Some(_) => Ok(()),
                None => mismatch("a timestamp", path),
            },
            FieldSpec::Url => match value.as_str().and_then(|raw| url::Url::parse(raw).ok()) {
                Some(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
                _ => mismatch("an http(s) url", path),
            },
            FieldSpec::StrList => match value {
                Value::Sequence(items) => {
                    for (idx, item) in items.iter().enumerate() {
                        path.push(idx.to_string());
                        let outcome = FieldSpec::Str.validate(item, path);
                        path.pop();
                        outcome?;
                    }
                    Ok(())
                }
                _ => mismatch("a list of strings", path),
            },
            FieldSpec::OneOf(choices) => {
                let Some(text) = scalar_text(value).filter(|t| !t.trim().is_empty()) else {
                    return mismatch("a non-empty string", path);
                };
                if choices.is_empty() || choices.iter().any(|c| c.eq_ignore_ascii_case(text.trim())) {
                    Ok(())
                } else {
                    mismatch(&format!("one of [{}]", choices.join(", ")), path)
                }
            }
            FieldSpec::Nullable(inner) => match value {
                Value::Null => Ok(()),
                other => inner.validate(other, path),
            },
            FieldSpec::Map(spec) => match value {
                Value::Mapping(_) => spec.validate(value, path),
                _ => mismatch("a mapping", path),
            },
            FieldSpec::MapOf(inner) => match value {
                Value::Mapping(map) => {
                    for (key, child) in map {
                        path.push(scalar_to_string(key).unwrap_or_default());
                        let outcome = inner.validate(child, path);
                        path.pop();
                        outcome?;
                    }
                    Ok(())
                }
                _ => mismatch("a mapping", path),
            },
        }
    }
}

impl From<MapSpec> for FieldSpec {
    fn from(spec: MapSpec) -> Self {
        FieldSpec::Map(spec)
    }
}

/// Mapping with known keys. Keys outside `required`/`optional` are checked
/// against `extra`, or rejected when `extra` is unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapSpec {
    pub required: IndexMap<String, FieldSpec>,
    pub optional: IndexMap<String, FieldSpec>,
    pub extra: Option<Box<FieldSpec>>,
}

impl MapSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, key: impl Into<String>, spec: impl Into<FieldSpec>) -> Self {
        self.required.insert(key.into(), spec.into());
        self
    }

    pub fn optional(mut self, key: impl Into<String>, spec: impl Into<FieldSpec>) -> Self {
        self.optional.insert(key.into(), spec.into());
        self
    }

    pub fn extra(mut self, spec: FieldSpec) -> Self {
        self.extra = Some(Box::new(spec));
        self
    }

    fn validate(&self, value: &Value, path: &mut Vec<String>) -> Result<()> {
        let Value::Mapping(map) = value else {
            return Err(ManifestError::validation(
                display_path(path),
                format!("expected a mapping, found {}", describe(value)),
            ));
        };
        for key in self.required.keys() {
            if !map.contains_key(key.as_str()) {
                return Err(ManifestError::validation(
                    display_path(path),
                    format!("missing required key `{key}`"),
                ));
            }
        }
        for (key, child) in map {
            let name = scalar_to_string(key).unwrap_or_default();
            let spec = self
                .required
                .get(&name)
                .or_else(|| self.optional.get(&name))
                .or(self.extra.as_deref());
            path.push(name);
            let outcome = match spec {
                Some(spec) => spec.validate(child, path),
                None => Err(ManifestError::validation(display_path(path), "unexpected key")),
            };
            path.pop();
            outcome?;
        }
        Ok(())
    }
}

/// Decimal numbers lose trailing zeros once parsed (`1.10` reads as `1.1`).
const QUOTED_DECIMAL: &str = "a quoted string for decimal values";

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(_) | Value::Number(_) => scalar_to_string(value),
        _ => None,
    }
}

fn display_path(path: &[String]) -> String {
    if path.is_empty() {
        "<root>".to_owned()
    } else {
        join(path)
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_owned(),
        Value::Bool(flag) => format!("boolean {flag}"),
        Value::Number(number) => format!("number {number}"),
        Value::String(text) => format!("string {text:?}"),
        Value::Sequence(_) => "a sequence".to_owned(),
        Value::Mapping(_) => "a mapping".to_owned(),
        Value::Tagged(tagged) => format!("a value tagged {}", tagged.tag),
    }
}

fn hashes_spec() -> FieldSpec {
    let digest = || FieldSpec::nullable(FieldSpec::Str);
    MapSpec::new()
        .optional("md5", digest())
        .optional("sha1", digest())
        .optional("sha256", digest())
        .optional("sha512", digest())
        .into()
}

/// Collects schema contributions while updaters register.
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    server_types: BTreeSet<String>,
    plugin_sections: IndexMap<String, FieldSpec>,
    updater_settings: IndexMap<String, FieldSpec>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Widen the accepted `server.type` values. Types are stored lowercase.
    pub fn add_server_types<I, S>(&mut self, types: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for server_type in types {
            self.server_types
                .insert(server_type.as_ref().trim().to_ascii_lowercase());
        }
    }

    /// Allow `plugins.<name>.<id>` with the given shape. Returns `false` when
    /// the id is already taken.
    pub fn add_plugin_section(&mut self, id: impl Into<String>, spec: FieldSpec) -> bool {
        let id = id.into();
        if self.plugin_sections.contains_key(&id) {
            return false;
        }
        debug!(section = %id, "plugin section added to manifest schema");
        self.plugin_sections.insert(id, spec);
        true
    }

    /// Allow `updater_settings.<id>` with the given shape.
    pub fn add_updater_settings(&mut self, id: impl Into<String>, spec: FieldSpec) -> bool {
        let id = id.into();
        if self.updater_settings.contains_key(&id) {
            return false;
        }
        self.updater_settings.insert(id, spec);
        true
    }

    pub fn server_types(&self) -> impl Iterator<Item = &str> {
        self.server_types.iter().map(String::as_str)
    }

    /// Freeze the current contributions.
    pub fn build(&self) -> Arc<ManifestSchema> {
        let settings = MapSpec::new()
            .required("last_update", FieldSpec::nullable(FieldSpec::Timestamp))
            .required("server_folder", FieldSpec::nullable(FieldSpec::Str))
            .required("update_cooldown", FieldSpec::Int)
            .required("keep_removed_plugins", FieldSpec::Bool)
            .required("update_order", FieldSpec::nullable(FieldSpec::StrList))
            .extra(FieldSpec::Any);

        let server_types: Vec<String> = self.server_types.iter().cloned().collect();
        let server = MapSpec::new()
            .required("enable", FieldSpec::Bool)
            .required("file", FieldSpec::NonEmptyStr)
            .required("type", FieldSpec::OneOf(server_types.clone()))
            .required("version", FieldSpec::NonEmptyStr)
            .required("build_number", FieldSpec::nullable(FieldSpec::Int))
            .required("custom_download_url", FieldSpec::nullable(FieldSpec::Url))
            .required("hashes", hashes_spec())
            .extra(FieldSpec::Any);

        let mut updater_settings = MapSpec::new().extra(FieldSpec::nullable(FieldSpec::Any));
        for (id, spec) in &self.updater_settings {
            updater_settings = updater_settings.optional(id.clone(), FieldSpec::nullable(spec.clone()));
        }

        let mut plugin = MapSpec::new()
            .optional("exclude", FieldSpec::nullable(FieldSpec::Bool))
            .optional("file", FieldSpec::nullable(FieldSpec::Str))
            .optional("version", FieldSpec::nullable(FieldSpec::Str))
            .optional("authors", FieldSpec::nullable(FieldSpec::StrList))
            .optional("hashes", FieldSpec::nullable(hashes_spec()))
            .extra(FieldSpec::nullable(FieldSpec::Any));
        for (id, spec) in &self.plugin_sections {
            plugin = plugin.optional(id.clone(), FieldSpec::nullable(spec.clone()));
        }

        let root = MapSpec::new()
            .required("settings", settings)
            .required("server", server)
            .optional("updater_settings", FieldSpec::nullable(updater_settings.into()))
            .optional("plugins", FieldSpec::nullable(FieldSpec::map_of(plugin.into())))
            .extra(FieldSpec::Any);

        Arc::new(ManifestSchema {
            root: root.into(),
            server_types,
            plugin_sections: self.plugin_sections.keys().cloned().collect(),
        })
    }
}

/// Immutable schema shared by every manifest handle.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestSchema {
    root: FieldSpec,
    server_types: Vec<String>,
    plugin_sections: Vec<String>,
}

impl ManifestSchema {
    pub fn validate(&self, document: &Value) -> Result<()> {
        self.root.validate(document, &mut Vec::new())
    }

    /// Supported server types, sorted and lowercase.
    pub fn server_types(&self) -> &[String] {
        &self.server_types
    }

    /// Registered plugin updater section ids, in registration order.
    pub fn plugin_sections(&self) -> &[String] {
        &self.plugin_sections
    }
}
