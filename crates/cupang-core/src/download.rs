//! ---
//! cupang_section: "06-download"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Retrying, cancellable artifact downloads."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
//! Artifact downloads.
//!
//! Every job streams into `<cache>/<destination>.incomplete` and is renamed to
//! its final cache name only once the body has been fully written. Transient
//! failures (transport errors, 408, 429, 5xx) are retried up to a bound; the
//! stop flag is honoured between chunks, after the body and between attempts.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cupang_logging::{cu_debug, cu_info, cu_warn, LogContext};
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::trace;

use crate::error::DownloadError;
use crate::stop::StopFlag;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);
pub const INCOMPLETE_SUFFIX: &str = ".incomplete";

/// One fetch. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub url: String,
    /// File name inside the cache folder.
    pub destination: String,
    pub display_name: String,
    pub headers: BTreeMap<String, String>,
}

impl DownloadJob {
    pub fn new(url: impl Into<String>, destination: impl Into<String>) -> Self {
        let destination = destination.into();
        Self {
            url: url.into(),
            display_name: destination.clone(),
            destination,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }
}

#[derive(Debug)]
pub enum DownloadOutcome {
    /// Path of the finished file in the cache folder.
    Completed(PathBuf),
    Cancelled,
    Failed(DownloadError),
}

/// Per-job lifecycle reported to a [`ProgressSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    InProgress,
    Retrying,
    Completed,
    Cancelled,
    Failed,
}

pub trait ProgressSink: Send + Sync {
    fn state_changed(&self, job: &DownloadJob, state: JobState, attempt: u32);

    /// `total` is `None` when the response carries no content length.
    fn progress(&self, job: &DownloadJob, transferred: u64, total: Option<u64>);
}

/// Default sink: lifecycle at debug/info, byte counts at trace.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn state_changed(&self, job: &DownloadJob, state: JobState, attempt: u32) {
        let ctx = LogContext::new()
            .with_artifact(&job.display_name)
            .with_phase("download");
        match state {
            JobState::Completed => cu_info!(context = ctx, "downloaded {}", job.destination),
            JobState::Cancelled => cu_info!(context = ctx, "download cancelled"),
            _ => cu_debug!(context = ctx, "download {:?} (attempt {})", state, attempt),
        }
    }

    fn progress(&self, job: &DownloadJob, transferred: u64, total: Option<u64>) {
        trace!(artifact = %job.display_name, transferred, total = ?total, "download progress");
    }
}

#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    async fn fetch(&self, job: DownloadJob) -> DownloadOutcome;
}

/// `reqwest`-backed fetcher writing into the cache folder.
#[derive(Clone)]
pub struct Downloader {
    client: reqwest::Client,
    cache_dir: PathBuf,
    stop: StopFlag,
    max_attempts: u32,
    retry_delay: Duration,
    user_agent: String,
    progress: Arc<dyn ProgressSink>,
}

impl std::fmt::Debug for Downloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downloader")
            .field("cache_dir", &self.cache_dir)
            .field("max_attempts", &self.max_attempts)
            .field("retry_delay", &self.retry_delay)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

enum Attempt {
    Finished,
    Stopped,
}

impl Downloader {
    pub fn new(cache_dir: impl Into<PathBuf>, stop: StopFlag) -> Result<Self, DownloadError> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            cache_dir: cache_dir.into(),
            stop,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            user_agent: cupang_versioning::VersionInfo::current().user_agent(),
            progress: Arc::new(TracingProgress),
        })
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Default `User-Agent` first, per-job headers on top.
    fn headers_for(&self, job: &DownloadJob) -> Result<HeaderMap, DownloadError> {
        let mut headers = HeaderMap::new();
        let agent = HeaderValue::from_str(&self.user_agent)
            .map_err(|err| DownloadError::InvalidContent(format!("invalid user agent: {err}")))?;
        headers.insert(USER_AGENT, agent);
        for (name, value) in &job.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| DownloadError::InvalidContent(format!("invalid header `{name}`: {err}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|err| DownloadError::InvalidContent(format!("invalid value for `{name}`: {err}")))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }

    async fn attempt(&self, job: &DownloadJob, staged: &Path) -> Result<Attempt, DownloadError> {
        let request = self.client.get(&job.url).headers(self.headers_for(job)?);
        let response = tokio::select! {
            response = request.send() => response?,
            _ = self.stop.wait() => return Ok(Attempt::Stopped),
        };

        let status = response.status();
        if !status.is_success() {
            let err = DownloadError::Status {
                status: status.as_u16(),
            };
            return Err(if err.is_transient() {
                err
            } else {
                DownloadError::InvalidContent(format!("{} answered {status}", job.url))
            });
        }

        let total = response.content_length();
        let mut file = fs::File::create(staged)
            .await
            .map_err(|err| DownloadError::io(staged, err))?;
        let mut stream = response.bytes_stream();
        let mut transferred = 0u64;
        self.progress.progress(job, transferred, total);
        loop {
            let next = tokio::select! {
                next = stream.next() => next,
                _ = self.stop.wait() => return Ok(Attempt::Stopped),
            };
            let Some(chunk) = next else { break };
            let chunk = chunk?;
            if self.stop.is_set() {
                return Ok(Attempt::Stopped);
            }
            file.write_all(&chunk)
                .await
                .map_err(|err| DownloadError::io(staged, err))?;
            transferred += chunk.len() as u64;
            self.progress.progress(job, transferred, total);
        }
        if self.stop.is_set() {
            return Ok(Attempt::Stopped);
        }
        file.flush().await.map_err(|err| DownloadError::io(staged, err))?;
        file.sync_all().await.map_err(|err| DownloadError::io(staged, err))?;
        Ok(Attempt::Finished)
    }
}

#[async_trait]
impl ArtifactFetcher for Downloader {
    async fn fetch(&self, job: DownloadJob) -> DownloadOutcome {
        let ctx = LogContext::new()
            .with_artifact(&job.display_name)
            .with_phase("download");
        if let Err(err) = fs::create_dir_all(&self.cache_dir).await {
            return DownloadOutcome::Failed(DownloadError::io(&self.cache_dir, err));
        }
        let destination = self.cache_dir.join(&job.destination);
        let staged = staged_path(&destination);

        let mut attempt = 0u32;
        self.progress.state_changed(&job, JobState::Pending, attempt);
        loop {
            if self.stop.is_set() {
                discard(&staged).await;
                self.progress.state_changed(&job, JobState::Cancelled, attempt);
                return DownloadOutcome::Cancelled;
            }
            attempt += 1;
            self.progress.state_changed(&job, JobState::InProgress, attempt);
            discard(&staged).await;

            match self.attempt(&job, &staged).await {
                Ok(Attempt::Finished) => {
                    if let Err(err) = fs::rename(&staged, &destination).await {
                        discard(&staged).await;
                        self.progress.state_changed(&job, JobState::Failed, attempt);
                        return DownloadOutcome::Failed(DownloadError::io(&destination, err));
                    }
                    self.progress.state_changed(&job, JobState::Completed, attempt);
                    return DownloadOutcome::Completed(destination);
                }
                Ok(Attempt::Stopped) => {
                    discard(&staged).await;
                    self.progress.state_changed(&job, JobState::Cancelled, attempt);
                    return DownloadOutcome::Cancelled;
                }
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    discard(&staged).await;
                    cu_warn!(
                        context = ctx,
                        "download of {} failed ({}), retrying {}/{}",
                        job.url,
                        err,
                        attempt + 1,
                        self.max_attempts
                    );
                    self.progress.state_changed(&job, JobState::Retrying, attempt);
                    if !self.stop.sleep(self.retry_delay).await {
                        self.progress.state_changed(&job, JobState::Cancelled, attempt);
                        return DownloadOutcome::Cancelled;
                    }
                    self.progress.state_changed(&job, JobState::Pending, attempt);
                }
                Err(err) => {
                    discard(&staged).await;
                    self.progress.state_changed(&job, JobState::Failed, attempt);
                    let err = if err.is_transient() {
                        DownloadError::Exhausted {
                            attempts: attempt,
                            last: Box::new(err),
                        }
                    } else {
                        err
                    };
                    cu_warn!(context = ctx, "download of {} failed: {}", job.url, err);
                    return DownloadOutcome::Failed(err);
                }
            }
        }
    }
}

/// `<path>.incomplete`, next to `path`.
pub fn staged_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(INCOMPLETE_SUFFIX);
    PathBuf::from(name)
}

async fn discard(path: &Path) {
    let _ = fs::remove_file(path).await;
}

/// Move a cached download into the artifact folder.
///
/// A plain rename is tried first. Across filesystems the file is copied to a
/// `.incomplete` sibling of `destination` and renamed from there, so the
/// destination never holds a partial file.
pub async fn publish_artifact(cached: &Path, destination: &Path) -> Result<(), DownloadError> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|err| DownloadError::io(parent, err))?;
    }
    if fs::rename(cached, destination).await.is_ok() {
        return Ok(());
    }
    let staged = staged_path(destination);
    if let Err(err) = fs::copy(cached, &staged).await {
        discard(&staged).await;
        return Err(DownloadError::io(&staged, err));
    }
    if let Err(err) = fs::rename(&staged, destination).await {
        discard(&staged).await;
        return Err(DownloadError::io(destination, err));
    }
    discard(cached).await;
    Ok(())
}
