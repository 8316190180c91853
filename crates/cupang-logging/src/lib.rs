//! ---
//! cupang_section: "10-logging"
//! cupang_subsection: "module"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Structured logging helpers."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
#![warn(missing_docs)]

//! Logging helpers shared by the scanner, the orchestrator and the updaters.
//! Every event carries the artifact and updater it concerns so that logs
//! from concurrent plugin jobs can be told apart.

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

/// Initialize a baseline tracing subscriber suitable for tests and tools.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer())
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Logical artifact name (plugin display name or `server`).
    pub artifact: Option<&'a str>,
    /// Updater the event concerns.
    pub updater: Option<&'a str>,
    /// Run phase (`scan`, `server-update`, `plugin-update`, `commit`).
    pub phase: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an artifact name.
    pub fn with_artifact(mut self, artifact: &'a str) -> Self {
        self.artifact = Some(artifact);
        self
    }

    /// Attach an updater name.
    pub fn with_updater(mut self, updater: &'a str) -> Self {
        self.updater = Some(updater);
        self
    }

    /// Attach a run phase.
    pub fn with_phase(mut self, phase: &'a str) -> Self {
        self.phase = Some(phase);
        self
    }
}

/// High-level outcome used when emitting run lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEventOutcome {
    /// The step completed.
    Success,
    /// The step was skipped (cooldown, excluded artifact, ...).
    Skipped,
    /// The step failed or was aborted.
    Fault,
}

impl RunEventOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            RunEventOutcome::Success => "success",
            RunEventOutcome::Skipped => "skipped",
            RunEventOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized run event with an outcome.
pub fn log_run_event(context: Option<&LogContext>, event: &str, message: &str, outcome: RunEventOutcome) {
    let default = LogContext::default();
    let ctx = context.unwrap_or(&default);
    let artifact = ctx.artifact.unwrap_or("");
    let updater = ctx.updater.unwrap_or("");
    let phase = ctx.phase.unwrap_or("");
    match outcome {
        RunEventOutcome::Fault => tracing::error!(
            event,
            outcome = outcome.as_str(),
            artifact,
            updater,
            phase,
            message = %message
        ),
        _ => tracing::info!(
            event,
            outcome = outcome.as_str(),
            artifact,
            updater,
            phase,
            message = %message
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macros_emit_without_panic() {
        init();
        let ctx = LogContext::new()
            .with_artifact("EssentialsX")
            .with_updater("Spigot");
        cu_info!(context = ctx.clone(), "update found");
        cu_debug!("debug message");
        cu_warn!(context = ctx.clone(), "retrying {} of {}", 2, 10);
        cu_error!(context = ctx, "status code: {}", 503);
    }

    #[test]
    fn run_event_helper_emits() {
        init();
        let ctx = LogContext::new().with_phase("scan");
        log_run_event(Some(&ctx), "scan.finished", "scan complete", RunEventOutcome::Success);
        log_run_event(None, "update.cooldown", "still cooling down", RunEventOutcome::Skipped);
        log_run_event(None, "update.failed", "folder missing", RunEventOutcome::Fault);
    }
}
