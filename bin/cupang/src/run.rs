//! ---
//! cupang_section: "09-runtime"
//! cupang_subsection: "binary"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Startup sequence wiring the registry, scanner and orchestrator."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
use std::sync::Arc;

use anyhow::{Context, Result};
use cupang_common::{AppPaths, RuntimeConfig};
use cupang_core::{
    new_registry, prepare_manifest, set_server_folder, Downloader, InventoryScanner, JarInspector,
    OrchestratorConfig, RunOutcome, RunReport, StopFlag, UpdateMetrics, UpdateOrchestrator,
    UpdaterRegistry,
};
use cupang_manifest::Manifest;
use cupang_updaters::{register_builtin, ReleaseClient};
use cupang_versioning::VersionInfo;
use tokio::signal;
use tracing::{info, warn};

use crate::Cli;

pub async fn execute(
    cli: &Cli,
    paths: &AppPaths,
    runtime: &RuntimeConfig,
    version: &VersionInfo,
) -> Result<()> {
    info!(version = %version.banner(), root = %paths.root.display(), "cupang-updater starting");

    let stop = StopFlag::new();
    spawn_signal_listener(stop.clone());

    let user_agent = runtime
        .user_agent
        .clone()
        .unwrap_or_else(|| version.user_agent());
    let client = ReleaseClient::new(&user_agent).context("unable to build release client")?;
    let mut registry = UpdaterRegistry::new();
    register_builtin(&mut registry, &client).context("updater registration failed")?;
    let registry = Arc::new(registry);

    let (mut manifest, created) = Manifest::load_or_create(&paths.manifest, registry.schema())
        .with_context(|| format!("unable to load manifest {}", paths.manifest.display()))?;
    if created {
        info!(manifest = %paths.manifest.display(), "default manifest written");
    }
    if let Some(folder) = &cli.server_folder {
        set_server_folder(&mut manifest, folder)?;
    }
    prepare_manifest(&mut manifest, &registry);
    manifest.save()?;

    let inspector = Arc::new(JarInspector);
    let report = InventoryScanner::new(inspector.clone(), registry.clone())
        .with_cleanup(cli.cleanup())
        .with_stop_flag(stop.clone())
        .scan(&mut manifest)?;
    if report.cancelled || cli.scan_only {
        return Ok(());
    }

    let downloader = Downloader::new(&paths.cache, stop.clone())?
        .with_max_attempts(runtime.max_attempts)
        .with_retry_delay(runtime.retry_delay)
        .with_user_agent(user_agent);
    let metrics = UpdateMetrics::new(new_registry())?;
    let orchestrator = UpdateOrchestrator::new(registry, Arc::new(downloader), inspector, stop)
        .with_config(OrchestratorConfig {
            workers: runtime.workers,
            poll_interval: runtime.poll_interval,
            force: cli.force,
        })
        .with_metrics(metrics.clone());

    let report = orchestrator.run(&mut manifest).await?;
    log_report(&report);

    if let Some(path) = &runtime.metrics_textfile {
        if let Err(err) = metrics.write_textfile(path) {
            warn!(error = %err, path = %path.display(), "unable to write metrics textfile");
        }
    }
    Ok(())
}

fn spawn_signal_listener(stop: StopFlag) {
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing current work");
            stop.stop();
        }
    });
}

fn log_report(report: &RunReport) {
    match report.outcome {
        RunOutcome::SkippedCooldown { .. } => {}
        RunOutcome::Completed => {
            let server = report
                .server
                .as_ref()
                .map(|server| server.file.display().to_string())
                .unwrap_or_else(|| "unchanged".to_owned());
            let plugins: Vec<&str> = report
                .updated_plugins
                .iter()
                .map(|plugin| plugin.plugin.as_str())
                .collect();
            info!(
                server = %server,
                plugins = %plugins.join(", "),
                cancelled = report.cancelled,
                "update run finished"
            );
        }
    }
}
