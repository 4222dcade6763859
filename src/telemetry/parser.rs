//! # Telemetry Parser
//!
//! Decodes validated CRSF frames into typed telemetry records.
//!
//! All multi-byte fields are little-endian. Payloads shorter than a type's
//! layout and type bytes without a decoder are not errors for the link: the
//! frame is simply skipped by [`parse_frame`].

use tracing::trace;

use crate::crsf::protocol::*;
use crate::error::{BridgeError, Result};

/// One decoded telemetry packet
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TelemetryRecord {
    LinkStatistics(LinkStatistics),
    Battery(BatterySensor),
    Gps(GpsData),
}

impl TelemetryRecord {
    /// Display fields for this record, in wire order.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            TelemetryRecord::LinkStatistics(stats) => vec![
                ("Uplink RSSI 1", stats.uplink_rssi_1.to_string()),
                ("Uplink RSSI 2", stats.uplink_rssi_2.to_string()),
                ("Uplink LQ", stats.uplink_lq.to_string()),
                ("Uplink SNR", stats.uplink_snr.to_string()),
                ("Active Antenna", stats.active_antenna.to_string()),
                ("RF Mode", stats.rf_mode.to_string()),
                ("Uplink TX Power", stats.uplink_tx_power.to_string()),
                ("Downlink RSSI", stats.downlink_rssi.to_string()),
                ("Downlink LQ", stats.downlink_lq.to_string()),
                ("Downlink SNR", stats.downlink_snr.to_string()),
            ],
            TelemetryRecord::Battery(battery) => vec![
                ("Voltage", format!("{:.2} V", battery.voltage)),
                ("Current", format!("{:.2} A", battery.current)),
                ("Capacity", format!("{} mAh", battery.capacity_used)),
                ("Remaining", format!("{} %", battery.remaining_percent)),
            ],
            TelemetryRecord::Gps(gps) => vec![
                ("Latitude", format!("{:.7}", gps.latitude)),
                ("Longitude", format!("{:.7}", gps.longitude)),
                ("Speed", format!("{} km/h", gps.ground_speed)),
                ("Heading", format!("{:.2}°", gps.heading)),
                ("Altitude", format!("{:.2} m", gps.altitude)),
            ],
        }
    }
}

/// Decode a validated frame into a telemetry record
///
/// Returns `None` for frame types without a telemetry decoder and for
/// truncated payloads.
pub fn parse_frame(frame: &CrsfFrame) -> Option<TelemetryRecord> {
    let result = match frame.frame_type {
        CRSF_FRAMETYPE_LINK_STATISTICS => {
            decode_link_statistics(&frame.payload).map(TelemetryRecord::LinkStatistics)
        }
        CRSF_FRAMETYPE_BATTERY_SENSOR => {
            decode_battery_sensor(&frame.payload).map(TelemetryRecord::Battery)
        }
        CRSF_FRAMETYPE_GPS => decode_gps(&frame.payload).map(TelemetryRecord::Gps),
        other => {
            trace!("Ignoring frame type 0x{:02X} ({:?})", other, frame.known_type());
            return None;
        }
    };

    match result {
        Ok(record) => Some(record),
        Err(e) => {
            trace!("Ignoring telemetry frame: {}", e);
            None
        }
    }
}

/// Decode Link Statistics telemetry packet
///
/// # Arguments
///
/// * `payload` - Link Statistics payload (10 bytes)
pub fn decode_link_statistics(payload: &[u8]) -> Result<LinkStatistics> {
    if payload.len() < CRSF_LINK_STATS_PAYLOAD_SIZE {
        return Err(BridgeError::CrsfProtocol(
            format!("Link stats payload too short: {} bytes", payload.len())
        ));
    }

    Ok(LinkStatistics {
        uplink_rssi_1: payload[0],
        uplink_rssi_2: payload[1],
        uplink_lq: payload[2],
        uplink_snr: payload[3] as i8,
        active_antenna: payload[4],
        rf_mode: payload[5],
        uplink_tx_power: payload[6],
        downlink_rssi: payload[7],
        downlink_lq: payload[8],
        downlink_snr: payload[9] as i8,
    })
}

/// Decode Battery Sensor telemetry packet
///
/// # Arguments
///
/// * `payload` - Battery Sensor payload (8 bytes)
pub fn decode_battery_sensor(payload: &[u8]) -> Result<BatterySensor> {
    if payload.len() < CRSF_BATTERY_SENSOR_PAYLOAD_SIZE {
        return Err(BridgeError::CrsfProtocol(
            format!("Battery sensor payload too short: {} bytes", payload.len())
        ));
    }

    // Voltage: centi-volts
    let voltage = u16::from_le_bytes([payload[0], payload[1]]) as f32 / 100.0;

    // Current: centi-amps
    let current = u16::from_le_bytes([payload[2], payload[3]]) as f32 / 100.0;

    let capacity_used = u16::from_le_bytes([payload[4], payload[5]]);
    let remaining_percent = payload[6];

    Ok(BatterySensor {
        voltage,
        current,
        capacity_used,
        remaining_percent,
    })
}

/// Decode GPS telemetry packet
///
/// # Arguments
///
/// * `payload` - GPS payload (15 bytes)
pub fn decode_gps(payload: &[u8]) -> Result<GpsData> {
    if payload.len() < CRSF_GPS_PAYLOAD_SIZE {
        return Err(BridgeError::CrsfProtocol(
            format!("GPS payload too short: {} bytes", payload.len())
        ));
    }

    // Latitude / longitude: degrees × 10^7
    let lat_raw = i32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
    let lon_raw = i32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]);

    let ground_speed = u16::from_le_bytes([payload[8], payload[9]]);

    // Heading: degrees × 100
    let heading = u16::from_le_bytes([payload[10], payload[11]]) as f32 / 100.0;

    // Altitude: signed 24-bit, centimeters
    let altitude_raw = i32::from_le_bytes([0, payload[12], payload[13], payload[14]]) >> 8;

    Ok(GpsData {
        latitude: lat_raw as f64 / 10_000_000.0,
        longitude: lon_raw as f64 / 10_000_000.0,
        ground_speed,
        heading,
        altitude: altitude_raw as f32 / 100.0,
    })
}
