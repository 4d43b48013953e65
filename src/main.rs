//! CLI entry point for the inline inspection rig
//!
//! Provides command-line interface for:
//! - Running the measurement and capture loops against the simulated rig
//! - Probing the remote collector
//! - Printing the effective configuration
//!
//! # Usage
//!
//! Run the rig until Ctrl+C:
//! ```bash
//! inline-inspection run --config config/inspection.toml
//! ```
//!
//! Check the collector:
//! ```bash
//! inline-inspection ping
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use inline_inspection::collector::{HttpCollector, RemoteCollector};
use inline_inspection::config::{LogFormat, RigConfig, DEFAULT_CONFIG_PATH};
use inline_inspection::orchestrator::{wait_for_collector, CaptureOrchestrator, OrchestratorSettings};
use inline_inspection::tracing_setup;
use rig_driver_sim::{AssetCatalog, CameraSimulator, VelocitySimulator};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "inline-inspection")]
#[command(about = "Inline inspection rig: surface velocity and stereo capture", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the measurement and capture loops until Ctrl+C
    Run {
        /// Override `application.log_level`
        #[arg(long)]
        log_level: Option<String>,

        /// Override `application.log_format`
        #[arg(long, value_enum)]
        log_format: Option<LogFormat>,
    },

    /// Probe the remote collector once
    Ping,

    /// Validate the configuration and print it as TOML
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = RigConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Commands::Run {
            log_level,
            log_format,
        } => {
            if let Some(level) = log_level {
                config.application.log_level = level;
            }
            if let Some(format) = log_format {
                config.application.log_format = format;
            }
            config.validate()?;
            run(config).await
        }
        Commands::Ping => ping(&config).await,
        Commands::CheckConfig => {
            config.validate()?;
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn run(config: RigConfig) -> Result<()> {
    tracing_setup::init_from_config(&config)?;

    let (stop, shutdown) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Ctrl+C received, shutting down"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
        }
        let _ = stop.send(true);
    });

    let collector: Arc<dyn RemoteCollector> = Arc::new(HttpCollector::from_config(&config.collector)?);
    tracing::info!(base_url = %config.collector.base_url, "Connecting to the collector");
    if !wait_for_collector(
        collector.as_ref(),
        config.collector.ping_interval()?,
        shutdown.clone(),
    )
    .await
    {
        tracing::info!("Shutdown before the collector became available");
        return Ok(());
    }

    let sensor = Arc::new(
        VelocitySimulator::builder()
            .config(config.velocity.simulator_config())
            .with_span(tracing::info_span!("velocity_sim"))
            .build(),
    );
    sensor.start();

    let mut camera = CameraSimulator::builder()
        .timing_config(config.camera.timing())
        .with_span(tracing::info_span!("camera_sim"));
    if let Some(dir) = &config.camera.asset_dir {
        tracing::info!(asset_dir = %dir.display(), "Loading pictures from disk");
        camera = camera.assets(AssetCatalog::directory(dir));
    }
    if let Some(seed) = config.camera.seed {
        camera = camera.seed(seed);
    }

    let orchestrator = CaptureOrchestrator::new(
        sensor.clone(),
        Arc::new(camera.build()),
        collector,
        OrchestratorSettings::try_from(&config)?,
    );
    let summary = orchestrator.run(shutdown).await;

    sensor.stop();
    sensor.join().await;
    tracing::info!(
        delivered = summary.delivered,
        failed = summary.failed,
        dropped = summary.dropped,
        abandoned = summary.abandoned,
        "Rig stopped"
    );
    Ok(())
}

async fn ping(config: &RigConfig) -> Result<()> {
    let collector = HttpCollector::from_config(&config.collector)?;
    if collector.ping().await {
        println!("✅ Collector at {} is available", collector.base_url());
        Ok(())
    } else {
        anyhow::bail!("collector at {} is not available", collector.base_url())
    }
}
