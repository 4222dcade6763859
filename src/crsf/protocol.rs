//! # CRSF Protocol Constants and Types
//!
//! Core protocol definitions for CRSF (Crossfire) communication.
//!
//! ## Frame Layout
//!
//! ```text
//! [sync=0xC8][length][type][payload...][crc8]
//! ```
//!
//! `length` counts the type byte, the payload and the CRC byte. The CRC is
//! CRC-8/DVB-S2 over `[type..payload-end]`.

use crate::crsf::crc::crc8_dvb_s2;
use crate::error::{BridgeError, Result};

/// CRSF frame sync byte (always 0xC8)
pub const CRSF_SYNC_BYTE: u8 = 0xC8;

/// RC Channels packet type
pub const CRSF_FRAMETYPE_RC_CHANNELS_PACKED: u8 = 0x16;

/// Link Statistics packet type
pub const CRSF_FRAMETYPE_LINK_STATISTICS: u8 = 0x14;

/// Battery Sensor packet type
pub const CRSF_FRAMETYPE_BATTERY_SENSOR: u8 = 0x08;

/// GPS packet type
pub const CRSF_FRAMETYPE_GPS: u8 = 0x02;

/// Maximum total CRSF frame size in bytes
pub const CRSF_MAX_FRAME_SIZE: usize = 64;

/// Maximum CRSF payload size
/// Frame structure: sync(1) + length(1) + type(1) + payload(N) + crc(1)
/// Maximum frame size is 64 bytes, so max payload = 64 - 4 = 60 bytes
pub const CRSF_MAX_PAYLOAD_SIZE: usize = CRSF_MAX_FRAME_SIZE - 4;

/// Smallest legal length byte (type + crc, empty payload)
pub const CRSF_MIN_LENGTH: u8 = 2;

/// RC channels payload size (22 bytes for 16 channels × 11 bits)
pub const CRSF_RC_CHANNELS_PAYLOAD_SIZE: usize = 22;

/// RC channels frame length (type + payload + crc)
pub const CRSF_RC_CHANNELS_FRAME_LENGTH: u8 = 0x18; // 24 bytes

/// Number of RC channels
pub const CRSF_NUM_CHANNELS: usize = 16;

/// Bits per packed RC channel
pub const CRSF_CHANNEL_BITS: u32 = 11;

/// Channel value range (11-bit: 0-2047)
pub const CRSF_CHANNEL_VALUE_MIN: u16 = 0;
pub const CRSF_CHANNEL_VALUE_MAX: u16 = 2047;
pub const CRSF_CHANNEL_VALUE_CENTER: u16 = 1024;

/// Link Statistics payload size
pub const CRSF_LINK_STATS_PAYLOAD_SIZE: usize = 10;

/// Battery Sensor payload size
pub const CRSF_BATTERY_SENSOR_PAYLOAD_SIZE: usize = 8;

/// GPS payload size
pub const CRSF_GPS_PAYLOAD_SIZE: usize = 15;

/// RC channels array type (16 channels, 11-bit values)
pub type RcChannels = [u16; CRSF_NUM_CHANNELS];

/// Frame types known to the bridge.
///
/// Only RC channels, link statistics, battery and GPS carry decoded
/// payloads. The rest are recognized so they can be named in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    Gps = 0x02,
    BatterySensor = 0x08,
    LinkStatistics = 0x14,
    RcChannelsPacked = 0x16,
    Attitude = 0x1E,
    FlightMode = 0x21,
    DevicePing = 0x28,
    DeviceInfo = 0x29,
    RequestSettings = 0x2A,
    ChannelsInfo = 0x2F,
}

impl TryFrom<u8> for FrameType {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, u8> {
        Ok(match value {
            0x02 => FrameType::Gps,
            0x08 => FrameType::BatterySensor,
            0x14 => FrameType::LinkStatistics,
            0x16 => FrameType::RcChannelsPacked,
            0x1E => FrameType::Attitude,
            0x21 => FrameType::FlightMode,
            0x28 => FrameType::DevicePing,
            0x29 => FrameType::DeviceInfo,
            0x2A => FrameType::RequestSettings,
            0x2F => FrameType::ChannelsInfo,
            other => return Err(other),
        })
    }
}

/// Link statistics telemetry data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStatistics {
    /// Uplink RSSI (antenna 1) in -dBm
    pub uplink_rssi_1: u8,

    /// Uplink RSSI (antenna 2) in -dBm (diversity)
    pub uplink_rssi_2: u8,

    /// Uplink link quality (0-100%)
    pub uplink_lq: u8,

    /// Uplink SNR in dB
    pub uplink_snr: i8,

    /// Active antenna (0 or 1)
    pub active_antenna: u8,

    /// RF mode / packet rate
    pub rf_mode: u8,

    /// Uplink TX power (encoded)
    pub uplink_tx_power: u8,

    /// Downlink RSSI in -dBm
    pub downlink_rssi: u8,

    /// Downlink link quality (0-100%)
    pub downlink_lq: u8,

    /// Downlink SNR in dB
    pub downlink_snr: i8,
}

/// Battery sensor telemetry data
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatterySensor {
    /// Battery voltage in volts
    pub voltage: f32,

    /// Current draw in amperes
    pub current: f32,

    /// Capacity used in mAh
    pub capacity_used: u16,

    /// Battery remaining percentage (0-100%)
    pub remaining_percent: u8,
}

/// GPS telemetry data
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsData {
    /// Latitude in degrees
    pub latitude: f64,

    /// Longitude in degrees
    pub longitude: f64,

    /// Ground speed in km/h
    pub ground_speed: u16,

    /// Heading in degrees
    pub heading: f32,

    /// Altitude in meters
    pub altitude: f32,
}

/// CRSF frame structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrsfFrame {
    /// Frame type
    pub frame_type: u8,

    /// Payload data
    pub payload: Vec<u8>,
}

impl CrsfFrame {
    /// Create a new CRSF frame
    ///
    /// # Arguments
    ///
    /// * `frame_type` - Frame type byte
    /// * `payload` - Payload data (max 60 bytes)
    ///
    /// # Errors
    ///
    /// Returns error if payload exceeds CRSF_MAX_PAYLOAD_SIZE (60 bytes)
    pub fn new(frame_type: u8, payload: Vec<u8>) -> Result<Self> {
        if payload.len() > CRSF_MAX_PAYLOAD_SIZE {
            return Err(BridgeError::CrsfProtocol(
                format!("Payload size {} exceeds maximum {}", payload.len(), CRSF_MAX_PAYLOAD_SIZE)
            ));
        }

        Ok(Self {
            frame_type,
            payload,
        })
    }

    /// Get frame length (type + payload + crc)
    ///
    /// Payloads never exceed 62 bytes (60 when built with `new`), so this fits a `u8`
    pub fn length(&self) -> u8 {
        (1 + self.payload.len() + 1) as u8
    }

    /// Known frame type, if the type byte is one the bridge recognizes
    pub fn known_type(&self) -> Option<FrameType> {
        FrameType::try_from(self.frame_type).ok()
    }

    /// Serialize to wire bytes: sync, length, type, payload, crc
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.payload.len() + 4);
        bytes.push(CRSF_SYNC_BYTE);
        bytes.push(self.length());
        bytes.push(self.frame_type);
        bytes.extend_from_slice(&self.payload);

        // CRC covers type + payload
        let crc = crc8_dvb_s2(&bytes[2..]);
        bytes.push(crc);
        bytes
    }
}
