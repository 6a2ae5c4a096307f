//! # vCR Glove Binary
//!
//! Drives the simulated gloves through a full session: scan, pair every
//! glove found, run one pattern until its countdown ends or Ctrl+C, then
//! disconnect everything.
//!
//! # Usage
//!
//! ```bash
//! # Two minutes of vCR on the left glove with default parameters
//! vcr_glove --seconds 120
//!
//! # Pulse long buzz on both gloves, configuration from file
//! vcr_glove --config config/glove.toml --pattern pulse --position both
//!
//! # Verbose JSON logs
//! vcr_glove -v --json
//! ```

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use vcr::config::{ConfigLoader, GloveConfig, LogLevel};
use vcr::consts::{POSITION_GLOVE_LEFT, POSITION_GLOVE_RIGHT};
use vcr::pattern::{PatternKind, PatternSpec};
use vcr_glove::drivers::SimulatedGloves;
use vcr_glove::{GloveEngine, GloveError, GloveHandle, GloveService};

/// Stimulation pattern to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PatternArg {
    /// Coordinated-reset bursts with the configured parameters
    Vcr,
    /// All motors on continuously
    Constant,
    /// All motors on every other second
    Pulse,
    /// All motors on every fifth second
    Intermittent,
}

impl From<PatternArg> for PatternKind {
    fn from(arg: PatternArg) -> Self {
        match arg {
            PatternArg::Vcr => PatternKind::CyclicBurst,
            PatternArg::Constant => PatternKind::Constant,
            PatternArg::Pulse => PatternKind::Pulse,
            PatternArg::Intermittent => PatternKind::Intermittent,
        }
    }
}

/// vCR Glove - stimulation scheduler for haptic gloves
#[derive(Parser, Debug)]
#[command(name = "vcr_glove")]
#[command(version)]
#[command(about = "vCR stimulation scheduler and device reconciler for haptic gloves")]
#[command(long_about = None)]
struct Args {
    /// Path to configuration file (glove.toml). Built-in defaults when omitted.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Glove position to stimulate: GloveL, GloveR or both
    #[arg(short, long, default_value = POSITION_GLOVE_LEFT)]
    position: String,

    /// Pattern to run
    #[arg(long, value_enum, default_value_t = PatternArg::Vcr)]
    pattern: PatternArg,

    /// Session length in seconds (defaults: untimed vCR, configured long buzz)
    #[arg(short, long)]
    seconds: Option<u64>,

    /// How long to scan before pairing
    #[arg(long, default_value_t = 3)]
    scan_seconds: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => GloveConfig::load(path)?,
        None => GloveConfig::with_service_name("vcr-glove"),
    };
    config.validate()?;

    setup_tracing(&args, config.shared.log_level);
    info!(
        "vCR glove v{} starting ({})",
        env!("CARGO_PKG_VERSION"),
        config.shared.service_name
    );

    let driver = Arc::new(SimulatedGloves::new());
    let engine = GloveEngine::new(&config, driver)?;
    let (glove, task) = GloveService::spawn(engine);

    if let Err(e) = run_session(&glove, &args, &config).await {
        error!("Session failed: {e}");
    }

    glove.disconnect_all().await?;
    for entry in glove.audit_tail(10).await? {
        info!("[{:>7}ms] {:?} {}", entry.at_ms, entry.tag, entry.message);
    }
    glove.shutdown().await?;
    task.await?;

    info!("vCR glove shutdown complete");
    Ok(())
}

async fn run_session(glove: &GloveHandle, args: &Args, config: &GloveConfig) -> Result<(), GloveError> {
    let positions = match args.position.as_str() {
        "both" => vec![POSITION_GLOVE_LEFT.to_string(), POSITION_GLOVE_RIGHT.to_string()],
        other => vec![other.to_string()],
    };

    glove.start_scan().await?;
    tokio::time::sleep(Duration::from_secs(args.scan_seconds)).await;

    let devices = glove.devices().await?;
    if devices.is_empty() {
        warn!("No gloves found after {}s of scanning", args.scan_seconds);
    }
    for device in &devices {
        glove.pair(device.id.clone()).await?;
    }
    tokio::time::sleep(config.discovery.pair_refresh_delay() + config.discovery.poll_interval()).await;
    glove.stop_scan().await?;

    for position in &positions {
        match args.pattern {
            PatternArg::Vcr => {
                glove
                    .start_vcr(position.clone(), config.stimulation.vcr, args.seconds)
                    .await?;
            }
            other => {
                let seconds = args.seconds.unwrap_or(config.stimulation.long_buzz_seconds);
                let spec = PatternSpec::long_buzz(other.into()).with_total_seconds(Some(seconds));
                glove.start_pattern(position.clone(), spec).await?;
            }
        }
    }

    let watch = async {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            ticker.tick().await;
            let mut any_active = false;
            for position in &positions {
                let status = glove.status(position.clone()).await?;
                any_active |= status.active;
                if let (true, Some(remaining)) = (status.active, status.remaining) {
                    info!("{position}: {}m {}s remaining", remaining / 60, remaining % 60);
                }
            }
            if !any_active {
                return Ok::<(), GloveError>(());
            }
        }
    };

    tokio::select! {
        result = watch => {
            result?;
            info!("Session completed");
        }
        signal = signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("Received shutdown signal (Ctrl+C)"),
                Err(e) => error!("Unable to listen for shutdown signal: {e}"),
            }
        }
    }

    for position in &positions {
        glove.stop_pattern(position.clone()).await?;
    }
    Ok(())
}

fn setup_tracing(args: &Args, level: LogLevel) {
    let directive = if args.verbose {
        LogLevel::Debug.as_directive()
    } else {
        level.as_directive()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
