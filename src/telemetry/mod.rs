//! # Telemetry Module
//!
//! Turns validated frames into the telemetry snapshot shown to the operator.
//!
//! This module handles:
//! - Decoding Link Statistics, Battery and GPS payloads
//! - Keeping the latest value of every field
//! - Periodic reporting of the snapshot
//! - Writing snapshots to rotating JSONL files

pub mod logger;
pub mod parser;
pub mod reporter;
pub mod snapshot;

pub use parser::{parse_frame, TelemetryRecord};
pub use snapshot::TelemetrySnapshot;
