//! ---
//! cupang_section: "03-manifest-store"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Key-path addressable manifest store."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
use std::fmt;

use serde_yaml::{Mapping, Value};

use crate::path::scalar_to_string;

/// One top-level key change made by [`merge_from_default`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeMutation {
    Added(String),
    Removed(String),
}

impl fmt::Display for MergeMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeMutation::Added(key) => write!(f, "added key `{key}`"),
            MergeMutation::Removed(key) => write!(f, "removed key `{key}`"),
        }
    }
}

/// Align the top-level keys of `existing` with `default`.
///
/// Keys missing from `existing` are copied from `default`. With `cleanup`,
/// keys of `existing` unknown to `default` are dropped. Values of shared keys
/// are never touched, so a second call is a no-op. A non-mapping `existing`
/// is replaced by a copy of `default`.
pub fn merge_from_default(existing: &mut Value, default: &Value, cleanup: bool) -> Vec<MergeMutation> {
    let Some(default) = default.as_mapping() else {
        return Vec::new();
    };
    if !existing.is_mapping() {
        *existing = Value::Mapping(Mapping::new());
    }
    let Some(target) = existing.as_mapping_mut() else {
        return Vec::new();
    };

    let mut mutations = Vec::new();
    if cleanup {
        let stale: Vec<Value> = target
            .keys()
            .filter(|key| !default.contains_key(*key))
            .cloned()
            .collect();
        for key in stale {
            target.shift_remove(&key);
            mutations.push(MergeMutation::Removed(scalar_to_string(&key).unwrap_or_default()));
        }
    }
    for (key, value) in default {
        if !target.contains_key(key) {
            target.insert(key.clone(), value.clone());
            mutations.push(MergeMutation::Added(scalar_to_string(key).unwrap_or_default()));
        }
    }
    mutations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn adds_missing_keys_and_keeps_values() {
        let mut existing = doc("file: Foo.jar\nversion: '2.0'\n");
        let default = doc("exclude: false\nfile:\nversion:\n");
        let mutations = merge_from_default(&mut existing, &default, false);
        assert_eq!(mutations, vec![MergeMutation::Added("exclude".into())]);
        assert_eq!(existing["file"], Value::from("Foo.jar"));
        assert_eq!(existing["exclude"], Value::Bool(false));
    }

    #[test]
    fn cleanup_removes_unknown_keys() {
        let mut existing = doc("file: Foo.jar\nlegacy: 1\n");
        let default = doc("file:\n");
        let mutations = merge_from_default(&mut existing, &default, true);
        assert_eq!(mutations, vec![MergeMutation::Removed("legacy".into())]);
        assert!(existing.get("legacy").is_none());
    }

    #[test]
    fn cleanup_keeps_order_of_remaining_keys() {
        let mut existing = doc("exclude: false\nfile: Foo.jar\nlegacy: 1\nversion: '1.0'\nauthors: []\nhashes: {}\n");
        let default = doc("exclude: false\nfile:\nversion:\nauthors: []\nhashes: {}\n");
        merge_from_default(&mut existing, &default, true);
        let keys: Vec<&str> = existing
            .as_mapping()
            .unwrap()
            .keys()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(keys, vec!["exclude", "file", "version", "authors", "hashes"]);
    }

    #[test]
    fn unknown_keys_survive_without_cleanup() {
        let mut existing = doc("legacy: 1\n");
        merge_from_default(&mut existing, &doc("file:\n"), false);
        assert_eq!(existing["legacy"], Value::from(1));
    }

    #[test]
    fn merge_is_idempotent() {
        let default = doc("exclude: false\nhashes:\n  md5:\nspigot:\n  resource_id:\n");
        let mut existing = doc("file: a.jar\nother: x\n");
        merge_from_default(&mut existing, &default, true);
        let once = existing.clone();
        let second = merge_from_default(&mut existing, &default, true);
        assert!(second.is_empty());
        assert_eq!(existing, once);
    }

    #[test]
    fn null_record_becomes_default() {
        let mut existing = Value::Null;
        let default = doc("exclude: false\n");
        merge_from_default(&mut existing, &default, true);
        assert_eq!(existing, default);
    }
}
