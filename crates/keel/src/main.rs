mod cli;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use keel_core::config::{ConfigSnapshot, HostConfig};
use keel_core::kernel::error::{EXIT_GRAPH_INVALID, EXIT_MODULES_FAILED, EXIT_OK};
use keel_core::kernel::ShellApplication;
use keel_core::module_system::{
    HostContext, ModuleDiscovery, ModuleValidator, parse_version,
};

use cli::{Cli, Command};

async fn build_config(
    config_path: Option<PathBuf>,
    modules_dirs: Vec<PathBuf>,
    policy: Option<String>,
) -> Result<HostConfig, keel_core::Error> {
    let mut config = match config_path {
        Some(path) => {
            let snapshot = ConfigSnapshot::from_file(&path).await?;
            HostConfig::from_snapshot(&snapshot)?
        }
        None => HostConfig::default(),
    };
    config.module_directories.extend(modules_dirs);
    if let Some(policy) = policy {
        config.failure_policy = policy.parse().map_err(keel_core::Error::Other)?;
    }
    Ok(config)
}

async fn run(config: HostConfig) -> i32 {
    let mut shell = match ShellApplication::new(config) {
        Ok(shell) => shell,
        Err(e) => {
            log::error!("{}", e);
            return e.exit_code();
        }
    };

    if let Err(e) = shell.bring_up().await {
        log::error!("bring-up failed: {}", e);
        shell.shut_down().await;
        return e.exit_code();
    }

    let health = shell.report_health().await;
    log::info!(
        "health: {} healthy, {} degraded, {} unhealthy",
        health.healthy,
        health.degraded,
        health.unhealthy
    );

    log::info!("running; press ctrl-c to stop");
    if tokio::signal::ctrl_c().await.is_err() {
        log::warn!("failed to listen for shutdown signal; stopping now");
    }

    shell.shut_down().await;

    let report = shell.lifecycle_report().await;
    if let Ok(rendered) = serde_json::to_string_pretty(&report) {
        log::info!("final lifecycle report:\n{}", rendered);
    }
    EXIT_OK
}

/// Discover candidates and validate the graph without creating any
/// isolation context.
async fn check(config: HostConfig) -> i32 {
    let shell_version = match config.shell_version.clone() {
        Some(version) => version,
        None => match parse_version(keel_core::kernel::constants::SHELL_VERSION) {
            Ok(version) => version,
            Err(e) => {
                log::error!("{}", e);
                return EXIT_MODULES_FAILED;
            }
        },
    };

    let discovery = ModuleDiscovery::new(config.module_directories.clone());
    let report = match discovery.discover().await {
        Ok(report) => report,
        Err(e) => {
            log::error!("discovery failed: {}", e);
            return EXIT_GRAPH_INVALID;
        }
    };
    for warning in &report.warnings {
        log::warn!("{}", warning);
    }

    let validator = ModuleValidator::new(HostContext::current(shell_version));
    let mut ok = true;
    for module in &report.modules {
        let result = validator.validate_module(module);
        for warning in &result.warnings {
            log::warn!("{}", warning);
        }
        for error in &result.errors {
            log::error!("{}", error);
            ok = false;
        }
    }
    let graph = validator.validate_graph(&report.modules);
    for warning in &graph.warnings {
        log::warn!("{}", warning);
    }
    for error in &graph.errors {
        log::error!("{}", error);
        ok = false;
    }

    if ok {
        log::info!("{} module(s) validated", report.modules.len());
        EXIT_OK
    } else {
        EXIT_GRAPH_INVALID
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let code = match cli.command {
        Command::Run {
            config,
            modules_dirs,
            policy,
        } => match build_config(config, modules_dirs, policy).await {
            Ok(config) => run(config).await,
            Err(e) => {
                log::error!("{}", e);
                e.exit_code()
            }
        },
        Command::Check {
            config,
            modules_dirs,
        } => match build_config(config, modules_dirs, None).await {
            Ok(config) => check(config).await,
            Err(e) => {
                log::error!("{}", e);
                e.exit_code()
            }
        },
    };

    ExitCode::from(code as u8)
}
