//! ---
//! cupang_section: "04-inventory-scan"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Embedded metadata extraction for plugin archives."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
//! Reads the logical name, version and authors embedded in a plugin archive.
//!
//! Descriptors are looked up in this order: `paper-plugin.yml`, `plugin.yml`,
//! `bungee.yml` (YAML), `velocity-plugin.json`, `fabric.mod.json` (JSON) and
//! `META-INF/mods.toml` (TOML, first `[[mods]]` entry).

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use cupang_manifest::path::scalar_to_string;
use serde::Deserialize;
use thiserror::Error;

const BUKKIT_DESCRIPTORS: [&str; 3] = ["paper-plugin.yml", "plugin.yml", "bungee.yml"];
const VELOCITY_DESCRIPTOR: &str = "velocity-plugin.json";
const FABRIC_DESCRIPTOR: &str = "fabric.mod.json";
const FORGE_DESCRIPTOR: &str = "META-INF/mods.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactMetadata {
    /// Logical name; this is the manifest key, not the file name.
    pub name: String,
    /// Declared version, `"0"` when the descriptor has none.
    pub version: String,
    pub authors: Vec<String>,
}

#[derive(Debug, Error)]
pub enum InspectError {
    #[error("unable to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path} is not a readable archive: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("{0} has no plugin descriptor")]
    NoDescriptor(PathBuf),
    #[error("{descriptor} in {path} is malformed: {message}")]
    Malformed {
        path: PathBuf,
        descriptor: &'static str,
        message: String,
    },
    #[error("{descriptor} in {path} does not declare a name")]
    MissingName {
        path: PathBuf,
        descriptor: &'static str,
    },
}

/// Source of artifact metadata. Implemented for archives by [`JarInspector`];
/// tests substitute their own.
pub trait ArtifactInspector: Send + Sync {
    fn inspect(&self, path: &Path) -> Result<ArtifactMetadata, InspectError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JarInspector;

#[derive(Default)]
struct RawMetadata {
    name: Option<String>,
    version: Option<String>,
    authors: Vec<String>,
}

impl ArtifactInspector for JarInspector {
    fn inspect(&self, path: &Path) -> Result<ArtifactMetadata, InspectError> {
        let file = File::open(path).map_err(|source| InspectError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut archive = zip::ZipArchive::new(file).map_err(|source| InspectError::Archive {
            path: path.to_path_buf(),
            source,
        })?;

        let malformed = |descriptor: &'static str, message: String| InspectError::Malformed {
            path: path.to_path_buf(),
            descriptor,
            message,
        };

        let (descriptor, raw) = if let Some((descriptor, text)) =
            first_entry(&mut archive, &BUKKIT_DESCRIPTORS)
        {
            let raw = match serde_yaml::from_str::<BukkitDescriptor>(&text) {
                Ok(typed) => typed.into(),
                Err(_) => {
                    let value: serde_yaml::Value = serde_yaml::from_str(&text)
                        .map_err(|err| malformed(descriptor, err.to_string()))?;
                    from_yaml(&value)
                }
            };
            (descriptor, raw)
        } else if let Some((descriptor, text)) =
            first_entry(&mut archive, &[VELOCITY_DESCRIPTOR, FABRIC_DESCRIPTOR])
        {
            let value: serde_json::Value =
                serde_json::from_str(&text).map_err(|err| malformed(descriptor, err.to_string()))?;
            (descriptor, from_json(&value))
        } else if let Some((descriptor, text)) = first_entry(&mut archive, &[FORGE_DESCRIPTOR]) {
            let value: toml::Value =
                toml::from_str(&text).map_err(|err| malformed(descriptor, err.to_string()))?;
            (descriptor, from_toml(&value))
        } else {
            return Err(InspectError::NoDescriptor(path.to_path_buf()));
        };

        let name = raw
            .name
            .map(|n| n.trim().to_owned())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| InspectError::MissingName {
                path: path.to_path_buf(),
                descriptor,
            })?;
        let version = raw
            .version
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "0".to_owned());
        Ok(ArtifactMetadata {
            name,
            version,
            authors: raw.authors,
        })
    }
}

fn first_entry<R: Read + io::Seek>(
    archive: &mut zip::ZipArchive<R>,
    candidates: &[&'static str],
) -> Option<(&'static str, String)> {
    for &candidate in candidates {
        let Ok(mut entry) = archive.by_name(candidate) else {
            continue;
        };
        let mut text = String::new();
        if entry.read_to_string(&mut text).is_ok() {
            return Some((candidate, text));
        }
    }
    None
}

/// Plain scalars deserialize into `String` as written, so `version: 1.10`
/// stays `1.10`.
#[derive(Debug, Deserialize)]
struct BukkitDescriptor {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    authors: Option<Vec<String>>,
}

impl From<BukkitDescriptor> for RawMetadata {
    fn from(descriptor: BukkitDescriptor) -> Self {
        let authors = match descriptor.authors {
            Some(authors) => authors,
            None => descriptor.author.into_iter().collect(),
        };
        RawMetadata {
            name: descriptor.name,
            version: descriptor.version,
            authors,
        }
    }
}

// Loose reading for descriptors whose fields do not fit `BukkitDescriptor`,
// e.g. a version list.
fn from_yaml(value: &serde_yaml::Value) -> RawMetadata {
    let version = match value.get("version") {
        Some(serde_yaml::Value::Sequence(items)) => items.first().and_then(scalar_to_string),
        Some(other) => scalar_to_string(other),
        None => None,
    };
    let authors = match value.get("authors") {
        Some(serde_yaml::Value::Sequence(items)) => {
            items.iter().filter_map(scalar_to_string).collect()
        }
        _ => value
            .get("author")
            .and_then(scalar_to_string)
            .into_iter()
            .collect(),
    };
    RawMetadata {
        name: value.get("name").and_then(scalar_to_string),
        version,
        authors,
    }
}

fn json_scalar(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(text) => Some(text.clone()),
        serde_json::Value::Number(number) => Some(number.to_string()),
        serde_json::Value::Array(items) => items.first().and_then(json_scalar),
        _ => None,
    }
}

fn from_json(value: &serde_json::Value) -> RawMetadata {
    let authors = match value.get("authors") {
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|author| match author {
                // fabric allows `{ "name": ..., "contact": ... }`
                serde_json::Value::Object(person) => person.get("name").and_then(json_scalar),
                other => json_scalar(other),
            })
            .collect(),
        Some(other) => json_scalar(other).into_iter().collect(),
        None => Vec::new(),
    };
    RawMetadata {
        name: value
            .get("name")
            .and_then(json_scalar)
            .or_else(|| value.get("id").and_then(json_scalar)),
        version: value.get("version").and_then(json_scalar),
        authors,
    }
}

fn from_toml(value: &toml::Value) -> RawMetadata {
    let Some(first) = value
        .get("mods")
        .and_then(toml::Value::as_array)
        .and_then(|mods| mods.first())
    else {
        return RawMetadata::default();
    };
    let text = |key: &str| first.get(key).and_then(toml::Value::as_str).map(str::to_owned);
    RawMetadata {
        name: text("modId"),
        version: text("version"),
        authors: text("authors").into_iter().collect(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    pub(crate) fn write_jar(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, body) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    fn inspect(entries: &[(&str, &str)]) -> Result<ArtifactMetadata, InspectError> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plugin.jar");
        write_jar(&path, entries);
        JarInspector.inspect(&path)
    }

    #[test]
    fn bukkit_descriptor_with_single_author() {
        let meta = inspect(&[("plugin.yml", "name: Foo\nversion: 1.2.3\nauthor: alice\n")]).unwrap();
        assert_eq!(meta.name, "Foo");
        assert_eq!(meta.version, "1.2.3");
        assert_eq!(meta.authors, vec!["alice"]);
    }

    #[test]
    fn decimal_versions_keep_their_text() {
        let meta = inspect(&[(
            "plugin.yml",
            "name: 1.5\nversion: 1.10\nauthors: [alice, 2.0]\napi-version: 1.20\n",
        )])
        .unwrap();
        assert_eq!(meta.name, "1.5");
        assert_eq!(meta.version, "1.10");
        assert_eq!(meta.authors, vec!["alice", "2.0"]);

        let meta = inspect(&[("paper-plugin.yml", "name: Foo\nversion: 2.50\nauthor: bob\n")]).unwrap();
        assert_eq!(meta.version, "2.50");
        assert_eq!(meta.authors, vec!["bob"]);
    }

    #[test]
    fn paper_descriptor_wins_over_plugin_yml() {
        let meta = inspect(&[
            ("plugin.yml", "name: Legacy\nversion: 1\n"),
            ("paper-plugin.yml", "name: Modern\nversion: 2\n"),
        ])
        .unwrap();
        assert_eq!(meta.name, "Modern");
        assert_eq!(meta.version, "2");
    }

    #[test]
    fn list_version_takes_first_and_missing_version_is_zero() {
        let meta = inspect(&[("plugin.yml", "name: Foo\nversion: ['1.0', '1.1']\n")]).unwrap();
        assert_eq!(meta.version, "1.0");
        let meta = inspect(&[("bungee.yml", "name: Proxy\n")]).unwrap();
        assert_eq!(meta.version, "0");
    }

    #[test]
    fn fabric_authors_may_be_objects() {
        let meta = inspect(&[(
            "fabric.mod.json",
            r#"{"id":"lithium","version":"0.11.2","authors":["jelly",{"name":"bob"}]}"#,
        )])
        .unwrap();
        assert_eq!(meta.name, "lithium");
        assert_eq!(meta.authors, vec!["jelly", "bob"]);
    }

    #[test]
    fn forge_reads_first_mod() {
        let meta = inspect(&[(
            "META-INF/mods.toml",
            "modLoader = \"javafml\"\n[[mods]]\nmodId = \"jei\"\nversion = \"15.2\"\nauthors = \"mezz\"\n",
        )])
        .unwrap();
        assert_eq!(meta.name, "jei");
        assert_eq!(meta.authors, vec!["mezz"]);
    }

    #[test]
    fn missing_name_and_descriptor_are_errors() {
        assert!(matches!(
            inspect(&[("plugin.yml", "version: 1\n")]),
            Err(InspectError::MissingName { .. })
        ));
        assert!(matches!(
            inspect(&[("README.txt", "hello")]),
            Err(InspectError::NoDescriptor(_))
        ));
    }

    #[test]
    fn non_archive_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jar");
        std::fs::write(&path, b"not a zip").unwrap();
        assert!(matches!(
            JarInspector.inspect(&path),
            Err(InspectError::Archive { .. })
        ));
    }
}
