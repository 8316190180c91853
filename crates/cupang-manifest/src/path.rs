//! ---
//! cupang_section: "03-manifest-store"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Key-path addressable manifest store."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
//! Key-path navigation over `serde_yaml::Value` trees.
//!
//! Dotted paths (`plugins.Foo.spigot`) are a convenience for fixed keys. Plugin
//! display names may contain dots, so every operation also has a segment form.

use serde_yaml::{Mapping, Value};

/// An owned, already-split key path.
pub type KeyPath = Vec<String>;

/// Split a dotted path. `""` and `"."` both address the root.
pub fn split(path: &str) -> KeyPath {
    if path.is_empty() || path == "." {
        return Vec::new();
    }
    path.split('.').map(str::to_owned).collect()
}

/// Join segments back into dotted form for diagnostics.
pub fn join<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(".")
}

pub fn lookup<'a, S: AsRef<str>>(root: &'a Value, segments: &[S]) -> Option<&'a Value> {
    let mut current = root;
    for segment in segments {
        current = current.as_mapping()?.get(segment.as_ref())?;
    }
    Some(current)
}

pub fn lookup_mut<'a, S: AsRef<str>>(root: &'a mut Value, segments: &[S]) -> Option<&'a mut Value> {
    let mut current = root;
    for segment in segments {
        current = current.as_mapping_mut()?.get_mut(segment.as_ref())?;
    }
    Some(current)
}

/// Write `value` at `segments`, creating missing mappings on the way.
///
/// A non-mapping intermediate is replaced by an empty mapping. An empty path
/// replaces the root.
pub fn insert<S: AsRef<str>>(root: &mut Value, segments: &[S], value: Value) {
    let Some((last, parents)) = segments.split_last() else {
        *root = value;
        return;
    };
    let mut current = root;
    for segment in parents {
        current = ensure_mapping(current)
            .entry(Value::String(segment.as_ref().to_owned()))
            .or_insert(Value::Null);
    }
    ensure_mapping(current).insert(Value::String(last.as_ref().to_owned()), value);
}

/// Remove the value at `segments`, keeping the order of its siblings.
pub fn remove<S: AsRef<str>>(root: &mut Value, segments: &[S]) -> Option<Value> {
    let (last, parents) = segments.split_last()?;
    lookup_mut(root, parents)?
        .as_mapping_mut()?
        .shift_remove(last.as_ref())
}

fn ensure_mapping(value: &mut Value) -> &mut Mapping {
    match value {
        Value::Mapping(map) => map,
        other => {
            *other = Value::Mapping(Mapping::new());
            ensure_mapping(other)
        }
    }
}

/// `null`, `false`, `0`, `""`, `[]` and `{}`.
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Sequence(items) => items.is_empty(),
        Value::Mapping(map) => map.is_empty(),
        Value::Tagged(tagged) => is_falsy(&tagged.value),
    }
}

/// Render a scalar the way it reads in the document, for version and file
/// fields that YAML may have typed as numbers.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        _ => None,
    }
}
