//! # FPV Telemetry
//!
//! Ground-station CLI for the telemetry core.
//!
//! Two modes:
//! - `fpv-telemetry <file.log>` - replay a recorded session: load it into
//!   the seekable timeline, then step through every position in order
//!   (a slow forward scrub), printing each event.
//! - `fpv-telemetry` - live session: open the telemetry radio configured
//!   in `config.toml`, print decoded events, optionally record the raw
//!   stream to the session log directory. Ctrl+C disconnects.

use anyhow::Result;
use tracing::{debug, info};

use fpv_telemetry::config::Config;
use fpv_telemetry::event::TelemetryEvent;
use fpv_telemetry::player::LogLoader;
use fpv_telemetry::serial;
use fpv_telemetry::session::{SessionLog, TelemetrySession};

/// Configuration file looked up in the working directory
const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("FPV Telemetry v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = match Config::load(CONFIG_PATH) {
        Ok(config) => config,
        Err(e) => {
            debug!("No usable {} ({}), using defaults", CONFIG_PATH, e);
            Config::default()
        }
    };

    match std::env::args().nth(1) {
        Some(log_file) => replay(&log_file).await,
        None => live(&config).await,
    }
}

/// Replay a recorded session log from start to finish
async fn replay(log_file: &str) -> Result<()> {
    info!("Loading session log: {}", log_file);

    let loader = LogLoader::spawn(log_file, |percent| {
        if percent % 10 == 0 {
            info!("Loading... {}%", percent);
        }
    });
    let mut player = loader.finish().await?;
    info!("Loaded {} events", player.total_events());

    let mut listener = |event: TelemetryEvent| println!("{:?}", event);
    for position in 0..player.total_events() {
        player.seek(position, &mut listener)?;
    }

    Ok(())
}

/// Run a live session until Ctrl+C
async fn live(config: &Config) -> Result<()> {
    let mut session = TelemetrySession::new();
    session.set_listener(Some(Box::new(|event: TelemetryEvent| {
        info!("{:?}", event);
    })));

    let log = if config.logging.enabled {
        Some(SessionLog::create_in(&config.logging.log_dir)?)
    } else {
        None
    };

    let port = config.serial.port.clone();
    let baud_rate = config.serial.baud_rate;
    session.connect(
        async move {
            serial::open_port(&port, baud_rate)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
        },
        log,
    )?;

    info!("Press Ctrl+C to disconnect");
    tokio::signal::ctrl_c().await?;

    info!("Received Ctrl+C, shutting down...");
    session.disconnect();
    session.wait_closed().await;

    Ok(())
}
