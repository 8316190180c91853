//! ---
//! cupang_section: "03-manifest-store"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Key-path addressable manifest store."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
use serde_yaml::Value;

use crate::comments::CommentMap;
use crate::Result;

/// A YAML value together with the comments written alongside it.
///
/// Updater defaults are declared as YAML text; keeping the comments lets the
/// scanner graft them into the manifest when it backfills a record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Section {
    pub value: Value,
    pub comments: CommentMap,
}

impl Section {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            comments: CommentMap::new(),
        }
    }

    /// Parse YAML text. Blank text yields a null section.
    pub fn parse(text: &str) -> Result<Self> {
        let value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_yaml::from_str(text)?
        };
        Ok(Self {
            value,
            comments: CommentMap::parse(text),
        })
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }
}

impl From<Value> for Section {
    fn from(value: Value) -> Self {
        Section::new(value)
    }
}
