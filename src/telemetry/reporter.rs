//! # Telemetry Reporter
//!
//! Periodically reports the telemetry snapshot to the log and, when a
//! [`TelemetryLogger`] is given, to the JSONL telemetry files.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use super::logger::TelemetryLogger;
use super::snapshot::TelemetrySnapshot;

/// One-line rendering, e.g. `Current: 1.00 A | Voltage: 10.00 V`
pub fn format_snapshot(snapshot: &TelemetrySnapshot) -> String {
    snapshot
        .iter()
        .map(|(name, value)| format!("{}: {}", name, value))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Report the snapshot once per `period` until `stop` turns true.
///
/// A tick only produces a report when the snapshot changed since the last
/// one. Returns the number of reports made.
pub async fn run_reporter(
    mut telemetry: watch::Receiver<TelemetrySnapshot>,
    period: Duration,
    mut logger: Option<TelemetryLogger>,
    mut stop: watch::Receiver<bool>,
) -> u64 {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut reports = 0;

    while !*stop.borrow() {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = stop.changed() => continue,
        }

        if !telemetry.has_changed().unwrap_or(false) {
            continue;
        }

        let snapshot = telemetry.borrow_and_update().clone();
        if snapshot.is_empty() {
            continue;
        }

        info!("Telemetry: {}", format_snapshot(&snapshot));

        if let Some(logger) = logger.as_mut() {
            if let Err(e) = logger.log(&snapshot) {
                warn!("Failed to write telemetry log: {}", e);
            }
        }
        reports += 1;
    }

    reports
}
