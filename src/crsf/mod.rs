//! # CRSF Protocol Module
//!
//! Implementation of the Crossfire (CRSF) protocol for the serial link.
//!
//! This module handles:
//! - RC channels packet encoding (16 channels, 11-bit resolution)
//! - Stream decoding with resynchronization on corrupted input
//! - CRC8-DVB-S2 checksum calculation
//! - Frame constants and telemetry record types

pub mod protocol;
pub mod encoder;
pub mod decoder;
pub mod crc;
