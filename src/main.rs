//! # CRSF Bridge
//!
//! Fly a CRSF (Crossfire / ExpressLRS) radio link from a desktop joystick.
//!
//! ```text
//! crsf-bridge [config.toml]
//! ```
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load configuration (defaults when the file is missing)
//!    - Set up logging with tracing subscriber
//!    - Open the joystick (optional; channels stay neutral without one)
//!    - Start the link session (RC writer + telemetry reader)
//!
//! 2. **Running**
//!    - RC channel frames at the configured packet rate
//!    - Telemetry report every `log_interval_ms`, optionally to JSONL files
//!
//! 3. **Graceful Shutdown** on Ctrl+C
//!    - Stop both link loops and close the serial port
//!
//! Expected output:
//! ```text
//! INFO crsf_bridge: CRSF Bridge v0.1.0 starting...
//! INFO crsf_bridge::session: Serial link up on /dev/ttyACM0 at 921600 baud
//! INFO crsf_bridge::telemetry::reporter: Telemetry: Current: 1.00 A | ...
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crsf_bridge::config::{Config, LoggingConfig};
use crsf_bridge::controller::joystick::Joystick;
use crsf_bridge::controller::RawInput;
use crsf_bridge::serial::{list_ports, SerialOpener};
use crsf_bridge::session::{LinkSession, SessionConfig};
use crsf_bridge::telemetry::logger::TelemetryLogger;
use crsf_bridge::telemetry::reporter::run_reporter;

/// Config file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Prefix of the daily log files
const LOG_FILE_PREFIX: &str = "crsf-bridge";

fn env_filter() -> EnvFilter {
    EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into())
}

/// Console logging, plus daily-rolling files when `file_dir` is set.
///
/// The returned guard flushes the file writer when dropped.
fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let Some(dir) = config.file_dir.as_deref() else {
        tracing_subscriber::fmt().with_env_filter(env_filter()).init();
        return Ok(None);
    };

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .build(dir)
        .with_context(|| format!("Failed to set up log files in {}", dir))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
        .init();

    Ok(Some(guard))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    let _log_guard = init_logging(&config.logging)?;

    info!("CRSF Bridge v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Configuration: {}", config_path);

    match list_ports() {
        Ok(ports) if ports.is_empty() => warn!("No serial ports found"),
        Ok(ports) => info!("Available serial ports: {}", ports.join(", ")),
        Err(e) => warn!("{}", e),
    }

    let table = config.mappings.to_table()?;
    info!("Loaded {} input mappings", table.len());

    let (input_tx, input_rx) = watch::channel(RawInput::default());
    let _joystick_thread = match Joystick::open(&config.controller.device_path) {
        Ok(joystick) => {
            info!(
                "Joystick '{}' at {}",
                joystick.name().unwrap_or("unknown"),
                joystick.device_path()
            );
            Some(joystick.spawn(input_tx)?)
        }
        Err(e) => {
            warn!("No joystick ({}), all channels stay neutral", e);
            None
        }
    };

    let session = LinkSession::start(
        SessionConfig::from(&config),
        Box::new(SerialOpener),
        input_rx,
        table,
    );

    let logger = if config.telemetry.enabled {
        Some(TelemetryLogger::new(
            &config.telemetry.log_dir,
            config.telemetry.max_records_per_file,
            config.telemetry.max_files_to_keep,
        )?)
    } else {
        None
    };

    let (stop_tx, stop_rx) = watch::channel(false);
    let reporter = tokio::spawn(run_reporter(
        session.telemetry(),
        Duration::from_millis(config.telemetry.log_interval_ms),
        logger,
        stop_rx,
    ));

    info!("Press Ctrl+C to exit");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("Received Ctrl+C, shutting down...");

    stop_tx.send_replace(true);
    session.stop().await;
    let reports = reporter.await?;
    info!("Stopped after {} telemetry reports", reports);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path() {
        assert_eq!(DEFAULT_CONFIG_PATH, "config.toml");
    }

    #[test]
    fn test_default_config_gives_50hz_session() {
        let session = SessionConfig::from(&Config::default());
        assert_eq!(session.packet_interval, Duration::from_millis(20));
        assert_eq!(session.port, "auto");
    }

    #[test]
    fn test_default_logging_is_console_only() {
        assert!(Config::default().logging.file_dir.is_none());
    }
}
