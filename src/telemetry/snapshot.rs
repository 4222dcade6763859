//! # Telemetry Snapshot
//!
//! Latest known value of every telemetry field, keyed by display name.

use std::collections::BTreeMap;

use serde::Serialize;

use super::parser::TelemetryRecord;

/// Latest value per telemetry field
///
/// Fields are overwritten as packets arrive and never cleared by a packet
/// that does not carry them, so different fields may come from different
/// decodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TelemetrySnapshot {
    fields: BTreeMap<String, String>,
}

impl TelemetrySnapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the fields carried by `record`.
    pub fn apply(&mut self, record: &TelemetryRecord) {
        for (name, value) in record.fields() {
            self.fields.insert(name.to_string(), value);
        }
    }

    /// Value of a single field, e.g. `snapshot.get("Voltage")`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// All fields, ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crsf::protocol::{BatterySensor, LinkStatistics};

    fn battery(voltage: f32) -> TelemetryRecord {
        TelemetryRecord::Battery(BatterySensor {
            voltage,
            current: 1.5,
            capacity_used: 420,
            remaining_percent: 80,
        })
    }

    #[test]
    fn test_apply_overwrites_fields() {
        let mut snapshot = TelemetrySnapshot::new();
        assert!(snapshot.is_empty());

        snapshot.apply(&battery(16.8));
        assert_eq!(snapshot.get("Voltage"), Some("16.80 V"));

        snapshot.apply(&battery(15.2));
        assert_eq!(snapshot.get("Voltage"), Some("15.20 V"));
        assert_eq!(snapshot.len(), 4);
    }

    #[test]
    fn test_apply_keeps_other_fields() {
        let mut snapshot = TelemetrySnapshot::new();
        snapshot.apply(&battery(12.0));

        snapshot.apply(&TelemetryRecord::LinkStatistics(LinkStatistics {
            uplink_rssi_1: 60,
            uplink_rssi_2: 62,
            uplink_lq: 100,
            uplink_snr: 9,
            active_antenna: 0,
            rf_mode: 4,
            uplink_tx_power: 2,
            downlink_rssi: 58,
            downlink_lq: 99,
            downlink_snr: -3,
        }));

        assert_eq!(snapshot.get("Voltage"), Some("12.00 V"), "battery fields must survive");
        assert_eq!(snapshot.get("Downlink SNR"), Some("-3"));
        assert_eq!(snapshot.len(), 14);
        assert_eq!(snapshot.get("Latitude"), None);
    }

    #[test]
    fn test_serializes_as_flat_map() {
        let mut snapshot = TelemetrySnapshot::new();
        snapshot.apply(&battery(10.0));

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["Voltage"], "10.00 V");
        assert_eq!(json["Remaining"], "80 %");
    }
}
