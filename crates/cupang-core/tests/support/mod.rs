//! ---
//! cupang_section: "07-update-orchestration"
//! cupang_subsection: "tests"
//! cupang_type: "source"
//! cupang_scope: "test"
//! cupang_description: "Shared fixtures for the core integration tests."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cupang_core::{
    prepare_manifest, set_server_folder, ArtifactFetcher, DownloadError, DownloadJob,
    DownloadOutcome, PluginQuery, PluginRecord, PluginUpdater, PluginUpdaterDescriptor,
    ServerQuery, ServerUpdater, ServerUpdaterDescriptor, StopFlag, UpdateOffer, UpdaterError,
    UpdaterRegistry,
};
use cupang_manifest::{FieldSpec, Manifest, MapSpec};
use parking_lot::Mutex;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

pub fn write_jar(path: &Path, entries: &[(&str, &str)]) {
    let file = File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    for (name, body) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(body.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

pub fn write_plugin(folder: &Path, file: &str, name: &str, version: &str) -> PathBuf {
    let path = folder.join(file);
    write_jar(
        &path,
        &[("plugin.yml", &format!("name: {name}\nversion: '{version}'\n"))],
    );
    path
}

#[derive(Clone)]
pub enum Behaviour {
    /// Offer `url/<plugin name>`.
    Offer(UpdateOffer),
    NoUpdate,
    Fail,
    Panic,
}

pub struct FakePluginUpdater {
    descriptor: PluginUpdaterDescriptor,
    behaviour: Behaviour,
    calls: AtomicUsize,
}

impl FakePluginUpdater {
    pub fn new(id: &str, name: &str, behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            descriptor: PluginUpdaterDescriptor {
                id: id.to_owned(),
                name: name.to_owned(),
                config_schema: MapSpec::new()
                    .optional("enabled", FieldSpec::nullable(FieldSpec::Bool))
                    .optional("commit", FieldSpec::nullable(FieldSpec::Str))
                    .optional("marker", FieldSpec::nullable(FieldSpec::Str))
                    .into(),
                config_default: String::new(),
                settings_schema: None,
                settings_default: None,
            },
            behaviour,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn with_settings(id: &str, name: &str, settings_default: &str) -> Arc<Self> {
        Arc::new(Self {
            descriptor: PluginUpdaterDescriptor {
                id: id.to_owned(),
                name: name.to_owned(),
                config_schema: FieldSpec::Any,
                config_default: "resource_id: # numeric id\n".to_owned(),
                settings_schema: Some(FieldSpec::Any),
                settings_default: Some(settings_default.to_owned()),
            },
            behaviour: Behaviour::NoUpdate,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PluginUpdater for FakePluginUpdater {
    fn descriptor(&self) -> &PluginUpdaterDescriptor {
        &self.descriptor
    }

    async fn check_update(&self, query: PluginQuery) -> Result<Option<UpdateOffer>, UpdaterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            Behaviour::Offer(offer) => {
                let mut offer = offer.clone();
                offer.url = format!("{}/{}", offer.url, query.plugin_name);
                Ok(Some(offer))
            }
            Behaviour::NoUpdate => Ok(None),
            Behaviour::Fail => Err(UpdaterError::InvalidContent("fake failure".into())),
            Behaviour::Panic => panic!("fake updater panicked"),
        }
    }
}

pub struct FakeServerUpdater {
    descriptor: ServerUpdaterDescriptor,
    offer: Option<UpdateOffer>,
}

impl FakeServerUpdater {
    pub fn new(name: &str, types: &[&str], offer: Option<UpdateOffer>) -> Arc<Self> {
        Arc::new(Self {
            descriptor: ServerUpdaterDescriptor {
                name: name.to_owned(),
                server_types: types.iter().map(|t| t.to_string()).collect(),
            },
            offer,
        })
    }
}

#[async_trait]
impl ServerUpdater for FakeServerUpdater {
    fn descriptor(&self) -> &ServerUpdaterDescriptor {
        &self.descriptor
    }

    async fn check_update(&self, _query: ServerQuery) -> Result<Option<UpdateOffer>, UpdaterError> {
        Ok(self.offer.clone())
    }
}

/// Writes a small jar for every job. URLs starting with a failing prefix
/// fail, URLs containing `slow` block until the stop flag is raised.
pub struct FakeFetcher {
    cache: PathBuf,
    stop: StopFlag,
    failing: Vec<String>,
    archive_version: String,
    jobs: Mutex<Vec<DownloadJob>>,
}

impl FakeFetcher {
    pub fn new(cache: &Path, stop: StopFlag) -> Self {
        Self {
            cache: cache.to_path_buf(),
            stop,
            failing: Vec::new(),
            archive_version: "9.9.9".to_owned(),
            jobs: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self, prefix: &str) -> Self {
        self.failing.push(prefix.to_owned());
        self
    }

    pub fn jobs(&self) -> Vec<DownloadJob> {
        self.jobs.lock().clone()
    }
}

#[async_trait]
impl ArtifactFetcher for FakeFetcher {
    async fn fetch(&self, job: DownloadJob) -> DownloadOutcome {
        self.jobs.lock().push(job.clone());
        if self.failing.iter().any(|prefix| job.url.starts_with(prefix)) {
            return DownloadOutcome::Failed(DownloadError::Exhausted {
                attempts: 3,
                last: Box::new(DownloadError::Status { status: 503 }),
            });
        }
        if job.url.contains("slow") {
            self.stop.wait().await;
            return DownloadOutcome::Cancelled;
        }
        std::fs::create_dir_all(&self.cache).unwrap();
        let path = self.cache.join(&job.destination);
        write_jar(
            &path,
            &[(
                "plugin.yml",
                &format!("name: {}\nversion: '{}'\n", job.display_name, self.archive_version),
            )],
        );
        DownloadOutcome::Completed(path)
    }
}

/// A manifest in a temp dir, pointed at `<tmp>/server` with a plugin folder.
pub struct Harness {
    pub dir: TempDir,
    pub server: PathBuf,
    pub plugins: PathBuf,
    pub cache: PathBuf,
    pub registry: Arc<UpdaterRegistry>,
    pub manifest: Manifest,
}

impl Harness {
    pub fn new(registry: UpdaterRegistry) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let server = dir.path().join("server");
        let plugins = server.join("plugins");
        std::fs::create_dir_all(&plugins).unwrap();
        let cache = dir.path().join("cache");
        let registry = Arc::new(registry);
        let mut manifest =
            Manifest::create_default(dir.path().join("config.yaml"), registry.schema()).unwrap();
        set_server_folder(&mut manifest, &server).unwrap();
        prepare_manifest(&mut manifest, &registry);
        manifest.save().unwrap();
        Self {
            dir,
            server,
            plugins,
            cache,
            registry,
            manifest,
        }
    }

    pub fn record(&self, name: &str) -> PluginRecord {
        let value = self
            .manifest
            .get_at(&["plugins", name])
            .unwrap_or_else(|| panic!("no record for {name}"));
        PluginRecord::from_value(name, value)
    }

    pub fn plugin_names(&self) -> Vec<String> {
        self.manifest
            .get("plugins")
            .and_then(|plugins| plugins.as_mapping())
            .map(|plugins| {
                plugins
                    .keys()
                    .filter_map(|key| key.as_str().map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default()
    }
}
