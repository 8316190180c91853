//! ---
//! cupang_section: "07-update-orchestration"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Error taxonomy for the orchestration engine."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
use std::path::PathBuf;

use cupang_manifest::ManifestError;
use thiserror::Error;

/// Result alias for run-level operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Run-level failures. Anything scoped to a single artifact or updater is
/// logged and absorbed instead of surfacing here.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("folder not found: {0}")]
    FolderNotFound(PathBuf),
    #[error("settings.server_folder is not set")]
    ServerFolderUnset,
    #[error("server folder must be an absolute path: {0}")]
    InvalidServerFolder(PathBuf),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl CoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Raised when an updater cannot be registered.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("updater `{updater}` is not fully initialised: {reason}")]
    NotInitialized { updater: String, reason: String },
}

impl RegistryError {
    pub(crate) fn not_initialized(updater: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NotInitialized {
            updater: updater.into(),
            reason: reason.into(),
        }
    }
}

/// Failures reported by an updater's `check_update`. The orchestrator treats
/// every variant as "no update from this source".
#[derive(Debug, Error)]
pub enum UpdaterError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },
    #[error("invalid content: {0}")]
    InvalidContent(String),
    #[error("invalid updater config: {0}")]
    Config(String),
}

/// Download failures. Only `Transport` and retryable `Status` values are
/// retried.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("http status {status}")]
    Status { status: u16 },
    #[error("invalid content: {0}")]
    InvalidContent(String),
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<DownloadError>,
    },
}

impl DownloadError {
    /// Transport errors, 408, 429 and 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            DownloadError::Transport(_) => true,
            DownloadError::Status { status } => matches!(status, 408 | 429 | 500..=599),
            _ => false,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
