//! ---
//! cupang_section: "09-runtime"
//! cupang_subsection: "binary"
//! cupang_type: "source"
//! cupang_scope: "code"
//! cupang_description: "Binary entrypoint for the cupang updater."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use cupang_common::{init_tracing, AppPaths, RuntimeConfig};
use cupang_versioning::VersionInfo;
use tracing::error;

mod run;

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    about = "Keeps a game server jar and its plugins up to date",
    long_about = None
)]
struct Cli {
    #[arg(short = 'f', long, help = "Ignore the update cooldown")]
    force: bool,

    #[arg(long, help = "Only reconcile the plugin folder with the manifest")]
    scan_only: bool,

    #[arg(long, value_name = "FILE", help = "Path to the manifest, relative to the config directory")]
    config: Option<PathBuf>,

    #[arg(
        long,
        value_name = "DIR",
        help = "Application directory holding config.yaml, logs and cache [default: ./cupang-updater]"
    )]
    config_dir: Option<PathBuf>,

    #[arg(
        long,
        overrides_with = "no_config_cleanup",
        help = "Drop unknown keys from plugin records (default)"
    )]
    config_cleanup: bool,

    #[arg(long, overrides_with = "config_cleanup", help = "Keep unknown keys in plugin records")]
    no_config_cleanup: bool,

    #[arg(long, value_name = "DIR", help = "Absolute path of the server folder to manage")]
    server_folder: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Path to the runtime configuration (TOML)")]
    runtime_config: Option<PathBuf>,

    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print extended version information and exit"
    )]
    version: bool,
}

impl Cli {
    fn cleanup(&self) -> bool {
        !self.no_config_cleanup
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let version = VersionInfo::current();
    if cli.version {
        println!("{}", version.extended());
        return ExitCode::SUCCESS;
    }

    let paths = AppPaths::resolve(cli.config_dir.as_deref(), cli.config.as_deref());
    if let Err(err) = paths.ensure_dirs() {
        eprintln!("cupang: {err:#}");
        return ExitCode::FAILURE;
    }
    let mut runtime = match RuntimeConfig::load(cli.runtime_config.as_deref(), &paths) {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("cupang: {err:#}");
            return ExitCode::FAILURE;
        }
    };
    if runtime.logging.directory.is_none() {
        runtime.logging.directory = Some(paths.logs.clone());
    }
    let _guard = match init_tracing("cupang", &runtime.logging) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("cupang: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    match run::execute(&cli, &paths, &runtime, &version).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %format!("{err:#}"), "cupang-updater stopped on a fatal error");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cleanup_defaults_on_and_last_flag_wins() {
        let cli = Cli::parse_from(["cupang"]);
        assert!(cli.cleanup());
        let cli = Cli::parse_from(["cupang", "--no-config-cleanup"]);
        assert!(!cli.cleanup());
        let cli = Cli::parse_from(["cupang", "--no-config-cleanup", "--config-cleanup"]);
        assert!(cli.cleanup());
    }

    #[test]
    fn short_flags_parse() {
        let cli = Cli::parse_from(["cupang", "-f", "--scan-only", "--server-folder", "/srv/mc"]);
        assert!(cli.force);
        assert!(cli.scan_only);
        assert_eq!(cli.server_folder, Some(PathBuf::from("/srv/mc")));
    }
}
