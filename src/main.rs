//! Hookline daemon: rebuilds the configured pipeline and runs it on a fixed
//! cadence, picking up hook edits between cycles.

use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use hookline_core::config::AppConfig;
use hookline_core::error::AppError;
use hookline_plugin::pipeline::{Pipeline, RunReport, StageStatus};

/// Hookline, a hot-reloadable hook pipeline daemon
#[derive(Debug, Parser)]
#[command(name = "hookline-daemon", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (falls back to $HOOKLINE_CONFIG)
    #[arg(short, long)]
    config: Option<String>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Print every stage's call chain and exit
    #[arg(long)]
    chain: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_configuration(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    match run(&cli, config).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            tracing::error!("Daemon error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Load configuration from the CLI path, `$HOOKLINE_CONFIG`, or the default
fn load_configuration(cli: &Cli) -> Result<AppConfig, AppError> {
    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var("HOOKLINE_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    AppConfig::load(&config_path)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main loop. Returns `false` when `--once` ran a cycle that aborted.
async fn run(cli: &Cli, config: AppConfig) -> Result<bool, AppError> {
    tracing::info!("Starting hookline v{}", env!("CARGO_PKG_VERSION"));

    let mut pipeline = hookline_plugin::build_pipeline(&config)?;

    if cli.chain {
        for (stage, chain) in pipeline.call_chains() {
            println!("{stage}: {}", chain.join(" -> "));
        }
        return Ok(true);
    }

    let interval = Duration::from_secs(config.pipeline.interval_seconds);
    let max_cycles = if cli.once {
        Some(1)
    } else {
        config.pipeline.max_cycles
    };
    let mut cycle: u64 = 0;

    loop {
        cycle += 1;

        if cycle > 1 && config.pipeline.rebuild_each_cycle {
            pipeline = hookline_plugin::build_pipeline(&config)?;
        }

        log_call_chains(&mut pipeline);
        let report = pipeline.run().await;
        log_report(cycle, &report);

        if max_cycles.is_some_and(|max| cycle >= max) {
            tracing::info!(cycles = cycle, "Cycle limit reached, stopping");
            return Ok(!report.is_aborted());
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received, stopping");
                return Ok(true);
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

fn log_call_chains(pipeline: &mut Pipeline) {
    for (stage, chain) in pipeline.call_chains() {
        tracing::info!(stage = %stage, chain = ?chain, "Call chain");
    }
}

fn log_report(cycle: u64, report: &RunReport) {
    for stage in &report.stages {
        match &stage.status {
            StageStatus::Failed {
                status_code,
                reason,
            } => tracing::warn!(
                cycle = cycle,
                stage = %stage.stage,
                status_code = ?status_code,
                reason = %reason,
                "Stage failed"
            ),
            StageStatus::Vetoed { hook } => tracing::info!(
                cycle = cycle,
                stage = %stage.stage,
                hook = %hook,
                "Stage vetoed"
            ),
            _ => {}
        }
    }

    match serde_json::to_string(report) {
        Ok(json) => tracing::debug!(cycle = cycle, report = %json, "Run report"),
        Err(e) => tracing::warn!(cycle = cycle, error = %e, "Run report could not be serialized"),
    }
}
