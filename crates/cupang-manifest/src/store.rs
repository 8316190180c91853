//! ---
//! cupang_section: "03-manifest-store"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Key-path addressable manifest store."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_yaml::Value;
use tracing::{debug, info};

use crate::comments::CommentMap;
use crate::defaults::DEFAULT_MANIFEST;
use crate::path::{self as keypath, scalar_to_string};
use crate::render::render_document;
use crate::schema::ManifestSchema;
use crate::section::Section;
use crate::{ManifestError, Result};

/// The loaded manifest: document, comments and the schema it was checked
/// against.
///
/// There is a single writer at a time; callers hand out cloned snapshots of
/// sub-trees rather than references into the store.
#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
    document: Value,
    comments: CommentMap,
    schema: Arc<ManifestSchema>,
}

impl Manifest {
    /// Read and validate the manifest at `path`.
    pub fn load(path: impl Into<PathBuf>, schema: Arc<ManifestSchema>) -> Result<Self> {
        let path = path.into();
        let text = fs::read_to_string(&path).map_err(|err| ManifestError::io(&path, err))?;
        let manifest = Self::from_text(&text, path, schema)?;
        debug!(manifest = %manifest.path.display(), "manifest loaded");
        Ok(manifest)
    }

    /// Build a manifest from YAML text without touching the filesystem.
    pub fn from_text(text: &str, path: impl Into<PathBuf>, schema: Arc<ManifestSchema>) -> Result<Self> {
        let Section { value, comments } = Section::parse(text)?;
        schema.validate(&value)?;
        Ok(Self {
            path: path.into(),
            document: value,
            comments,
            schema,
        })
    }

    /// Write the default document to `path` and load it.
    pub fn create_default(path: impl Into<PathBuf>, schema: Arc<ManifestSchema>) -> Result<Self> {
        let path = path.into();
        write_atomic(&path, DEFAULT_MANIFEST)?;
        info!(manifest = %path.display(), "default manifest created");
        Self::load(path, schema)
    }

    /// Load `path`, creating the default document first when it is missing.
    /// The flag reports whether the file was created.
    pub fn load_or_create(path: impl Into<PathBuf>, schema: Arc<ManifestSchema>) -> Result<(Self, bool)> {
        let path = path.into();
        if path.exists() {
            Ok((Self::load(path, schema)?, false))
        } else {
            Ok((Self::create_default(path, schema)?, true))
        }
    }

    /// Re-read the file. The in-memory state is only replaced when the new
    /// content validates.
    pub fn reload(&mut self) -> Result<()> {
        let fresh = Self::load(self.path.clone(), Arc::clone(&self.schema))?;
        self.document = fresh.document;
        self.comments = fresh.comments;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.schema.validate(&self.document)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&self.path)
    }

    /// Render with comments and replace `path` atomically.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        write_atomic(path, &self.render()?)?;
        debug!(manifest = %path.display(), "manifest saved");
        Ok(())
    }

    pub fn render(&self) -> Result<String> {
        Ok(render_document(&self.document, &self.comments)?)
    }

    /// Value at a dotted path. Missing and null values both read as `None`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.get_at(&keypath::split(path))
    }

    pub fn get_at<S: AsRef<str>>(&self, segments: &[S]) -> Option<&Value> {
        keypath::lookup(&self.document, segments).filter(|value| !value.is_null())
    }

    pub fn get_or(&self, path: &str, default: impl Into<Value>) -> Value {
        self.get(path).cloned().unwrap_or_else(|| default.into())
    }

    /// Scalar at `path` rendered as text (numbers and booleans included).
    pub fn get_str(&self, path: &str) -> Option<String> {
        self.get(path).and_then(scalar_to_string)
    }

    /// Deserialize the value at `path`. Missing or null reads as `Ok(None)`.
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        match self.get(path) {
            None => Ok(None),
            Some(value) => serde_yaml::from_value(value.clone())
                .map(Some)
                .map_err(|source| ManifestError::Decode {
                    path: path.to_owned(),
                    source,
                }),
        }
    }

    /// Write `value` at a dotted path. Falsy values are ignored; the return
    /// value reports whether anything was written.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> bool {
        self.set_at(&keypath::split(path), value)
    }

    pub fn set_at<S: AsRef<str>>(&mut self, segments: &[S], value: impl Into<Value>) -> bool {
        let value = value.into();
        if segments.is_empty() || keypath::is_falsy(&value) {
            return false;
        }
        keypath::insert(&mut self.document, segments, value);
        true
    }

    /// Unconditional write, including null and `false`.
    pub fn put_at<S: AsRef<str>>(&mut self, segments: &[S], value: impl Into<Value>) {
        keypath::insert(&mut self.document, segments, value.into());
    }

    /// Write a section's value and graft its comments under `segments`.
    pub fn put_section<S: AsRef<str>>(&mut self, segments: &[S], section: &Section) {
        keypath::insert(&mut self.document, segments, section.value.clone());
        self.comments.graft(segments, &section.comments);
    }

    /// Remove the value at `segments` together with its comments.
    pub fn remove_at<S: AsRef<str>>(&mut self, segments: &[S]) -> Option<Value> {
        let removed = keypath::remove(&mut self.document, segments)?;
        self.comments.remove_subtree(segments);
        Some(removed)
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn comments(&self) -> &CommentMap {
        &self.comments
    }

    pub fn comments_mut(&mut self) -> &mut CommentMap {
        &mut self.comments
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &Arc<ManifestSchema> {
        &self.schema
    }
}

/// Write to `<path>.incomplete` and rename over `path`.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| ManifestError::io(parent, err))?;
    }
    let mut staged = path.as_os_str().to_owned();
    staged.push(".incomplete");
    let staged = PathBuf::from(staged);
    fs::write(&staged, contents).map_err(|err| ManifestError::io(&staged, err))?;
    fs::rename(&staged, path).map_err(|err| {
        let _ = fs::remove_file(&staged);
        ManifestError::io(path, err)
    })
}
