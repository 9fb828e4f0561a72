mod analyzer;
mod cli;
mod commands;
mod config;
mod encoder;
mod error;
mod search;
mod tools;
mod utils;
mod verifier;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cli::{Cli, Command};
use config::AppConfig;
use error::AppError;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tools::FfmpegTools;
use tracing::{error, warn};
use utils::{CancelFlag, DependencyStatus};

/// Exit code when the CRF search of `optimize` fails
const EXIT_SEARCH_FAILED: u8 = 2;
const EXIT_CANCELLED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let _log_guard = utils::init_logging();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let app_error = e.chain().find_map(|cause| cause.downcast_ref::<AppError>());
            match app_error {
                Some(err) if err.is_cancelled() => {
                    warn!("Cancelled");
                    ExitCode::from(EXIT_CANCELLED)
                }
                Some(AppError::SearchFailed(_)) => {
                    error!("Fatal: {:#}", e);
                    ExitCode::from(EXIT_SEARCH_FAILED)
                }
                _ => {
                    error!("{:#}", e);
                    ExitCode::FAILURE
                }
            }
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let Cli {
        config: config_file,
        command,
    } = cli;

    let config = AppConfig::load(config_file.as_deref());
    if !matches!(command, Command::InitConfig { .. }) {
        config.validate().context("invalid configuration")?;

        let deps = DependencyStatus::check();
        if !deps.all_present() {
            bail!("missing dependencies: {}", deps.missing().join(", "));
        }
    }

    let cancel: CancelFlag = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping");
            flag.store(true, Ordering::Relaxed);
        }
    });

    let tools = FfmpegTools::new(cancel, config.sampling.scene_threshold, config.vmaf.threads);
    tokio::task::spawn_blocking(move || {
        commands::dispatch(command, config_file.as_deref(), &config, &tools)
    })
    .await
    .context("worker thread panicked")?
}
