//! gpio-pulsed daemon entry point.
//!
//! Loads the configuration, binds the described pulse sources on simulated
//! controllers, and runs until Ctrl-C or the configured run time.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use gpio_pulsed::{Daemon, DaemonConfig, RunOptions};

/// GPIO pulse counter daemon
#[derive(Parser, Debug)]
#[command(name = "gpio-pulsed")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (YAML)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Fire every bound simulated line at this interval (0 = off)
    #[arg(long, default_value = "0")]
    simulate_interval_ms: u64,

    /// Report device statistics at this interval (0 = off)
    #[arg(long, default_value = "5000")]
    report_interval_ms: u64,

    /// Exit after this long (0 = run until Ctrl-C)
    #[arg(long, default_value = "0")]
    run_for_ms: u64,

    /// Log level used when RUST_LOG is unset
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to set tracing subscriber: {}", e))
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Unable to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => DaemonConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => DaemonConfig::default(),
    };
    config.validate()?;

    let daemon = Daemon::new(config);
    let bound = daemon.start().context("probe failed")?;
    info!("{} pulse sources bound", bound);

    let options = RunOptions::from_millis(
        args.simulate_interval_ms,
        args.report_interval_ms,
        args.run_for_ms,
    );
    let handled = daemon.run(options, wait_for_ctrl_c()).await;
    info!("{} simulated pulses handled", handled);

    daemon.report();
    if !daemon.stop() {
        bail!("devices still alive after teardown");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(&args.log_level) {
        eprintln!("gpio-pulsed: {:#}", e);
        return ExitCode::FAILURE;
    }

    info!("--- Starting gpio-pulsed ---");

    match run(args).await {
        Ok(()) => {
            info!("gpio-pulsed exiting normally");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("gpio-pulsed error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
