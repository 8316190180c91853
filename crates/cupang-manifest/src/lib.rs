//! ---
//! cupang_section: "03-manifest-store"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Key-path addressable manifest store."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
//! The manifest is the single persisted document describing the server slot,
//! every managed plugin and the per-updater settings. It is held as a
//! `serde_yaml::Value` with comments tracked alongside, validated against a
//! schema that grows as updaters register, and saved atomically.

use std::path::PathBuf;

use thiserror::Error;

pub mod comments;
pub mod defaults;
pub mod merge;
pub mod path;
mod render;
pub mod schema;
pub mod section;
pub mod store;
pub mod timestamp;

pub use comments::{Comment, CommentMap};
pub use merge::{merge_from_default, MergeMutation};
pub use path::KeyPath;
pub use schema::{FieldSpec, ManifestSchema, MapSpec, SchemaBuilder};
pub use section::Section;
pub use store::Manifest;
pub use timestamp::parse_timestamp;

/// Errors raised while loading, validating or persisting the manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse manifest: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid manifest at `{path}`: {message}")]
    Validation { path: String, message: String },
    #[error("value at `{path}` has an unexpected shape: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl ManifestError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ManifestError>;
