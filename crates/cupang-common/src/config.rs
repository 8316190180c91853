//! ---
//! cupang_section: "09-runtime"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Shared primitives and utilities for the updater runtime."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::debug;

use crate::logging::LogFormat;

/// Directory name used when no `--config-dir` is supplied.
pub const DEFAULT_APP_DIR: &str = "cupang-updater";
/// File name of the artifact manifest inside the application directory.
pub const MANIFEST_FILE: &str = "config.yaml";
/// File name of the optional runtime configuration.
pub const RUNTIME_CONFIG_FILE: &str = "runtime.toml";

fn default_workers() -> usize {
    5
}

fn default_max_attempts() -> u32 {
    10
}

fn default_retry_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

/// On-disk layout of the application directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    /// Root application directory.
    pub root: PathBuf,
    /// Manifest (`config.yaml`) location.
    pub manifest: PathBuf,
    /// Rolling log directory.
    pub logs: PathBuf,
    /// Download cache; files land here before being moved into place.
    pub cache: PathBuf,
}

impl AppPaths {
    /// Resolve the layout from an optional root and an optional manifest override.
    ///
    /// A relative manifest override is interpreted relative to the root.
    pub fn resolve(root: Option<&Path>, manifest: Option<&Path>) -> Self {
        let root = root
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_APP_DIR));
        let manifest = match manifest {
            Some(path) if path.is_absolute() => path.to_path_buf(),
            Some(path) => root.join(path),
            None => root.join(MANIFEST_FILE),
        };
        Self {
            logs: root.join("logs"),
            cache: root.join("cache"),
            manifest,
            root,
        }
    }

    /// Create the root, log and cache directories.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.root, &self.logs, &self.cache] {
            fs::create_dir_all(dir)
                .with_context(|| format!("unable to create directory {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Process-level knobs that do not belong in the artifact manifest.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Width of the plugin update worker pool.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Upper bound on download attempts per job.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Pause between download attempts.
    #[serde(default = "default_retry_delay")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub retry_delay: Duration,
    /// How often the pool wait re-checks the stop flag.
    #[serde(default = "default_poll_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub poll_interval: Duration,
    /// Override for the outbound `User-Agent` header.
    #[serde(default)]
    pub user_agent: Option<String>,
    /// When set, run metrics are written here in Prometheus text format.
    #[serde(default)]
    pub metrics_textfile: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_attempts: default_max_attempts(),
            retry_delay: default_retry_delay(),
            poll_interval: default_poll_interval(),
            user_agent: None,
            metrics_textfile: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub const ENV_CONFIG_PATH: &'static str = "CUPANG_RUNTIME_CONFIG";

    /// Load the runtime configuration.
    ///
    /// Resolution order: the explicit path, the `CUPANG_RUNTIME_CONFIG`
    /// environment variable, then `runtime.toml` inside the application
    /// directory. A missing implicit file yields defaults; a missing explicit
    /// file is an error.
    pub fn load(explicit: Option<&Path>, paths: &AppPaths) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_path(path);
        }
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                return Self::from_path(Path::new(&env_path));
            }
        }
        let candidate = paths.root.join(RUNTIME_CONFIG_FILE);
        if candidate.exists() {
            return Self::from_path(&candidate);
        }
        let mut config = Self::default();
        config.logging.directory = Some(paths.logs.clone());
        Ok(config)
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading runtime configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read runtime config {}", path.display()))?;
        let config: RuntimeConfig = contents
            .parse()
            .with_context(|| format!("failed to parse runtime config {}", path.display()))?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(anyhow!("workers must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(anyhow!("max_attempts must be at least 1"));
        }
        if self.poll_interval.is_zero() {
            return Err(anyhow!("poll_interval must be greater than zero"));
        }
        Ok(())
    }
}

impl std::str::FromStr for RuntimeConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: RuntimeConfig =
            toml::from_str(content).with_context(|| "failed to parse runtime configuration")?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for the rolling JSON log; defaults to `<app dir>/logs`.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_manifest_resolves_under_root() {
        let paths = AppPaths::resolve(Some(Path::new("/srv/cupang")), Some(Path::new("alt.yaml")));
        assert_eq!(paths.manifest, PathBuf::from("/srv/cupang/alt.yaml"));
        assert_eq!(paths.cache, PathBuf::from("/srv/cupang/cache"));
    }

    #[test]
    fn absolute_manifest_is_kept() {
        let paths = AppPaths::resolve(None, Some(Path::new("/etc/cupang.yaml")));
        assert_eq!(paths.manifest, PathBuf::from("/etc/cupang.yaml"));
        assert_eq!(paths.root, PathBuf::from(DEFAULT_APP_DIR));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: RuntimeConfig = "workers = 2\nretry_delay = 10\n".parse().unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.retry_delay, Duration::from_millis(10));
        assert_eq!(config.max_attempts, 10);
    }

    #[test]
    fn zero_workers_rejected() {
        let err = "workers = 0".parse::<RuntimeConfig>().unwrap_err();
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn missing_implicit_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::resolve(Some(dir.path()), None);
        let config = RuntimeConfig::load(None, &paths).unwrap();
        assert_eq!(config.workers, 5);
        assert_eq!(config.logging.directory, Some(paths.logs.clone()));
    }

    #[test]
    fn implicit_file_is_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::resolve(Some(dir.path()), None);
        fs::write(dir.path().join(RUNTIME_CONFIG_FILE), "max_attempts = 3\n").unwrap();
        let config = RuntimeConfig::load(None, &paths).unwrap();
        assert_eq!(config.max_attempts, 3);
    }
}
