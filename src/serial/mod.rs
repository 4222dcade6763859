//! # Serial Communication Module
//!
//! Handles the serial link to the CRSF transmitter module.
//!
//! This module handles:
//! - Discovering serial ports and resolving `"auto"`
//! - Opening a port with CRSF settings (8N1, no flow control)
//! - The supported baud rates and cycling through them

pub mod port_trait;

use crate::error::{BridgeError, Result};
use port_trait::{PortOpener, SerialPortIO, TokioSerialPort};
use std::path::Path;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info};

/// Port name that selects the first discovered serial port
pub const AUTO_PORT: &str = "auto";

/// Baud rates the link can be configured with, ascending
pub const SUPPORTED_BAUD_RATES: &[u32] = &[
    9_600, 19_200, 38_400, 57_600, 115_200, 400_000, 420_000, 921_600, 1_870_000, 3_750_000,
    5_250_000,
];

/// Baud rate used when none is configured
pub const DEFAULT_BAUD_RATE: u32 = 921_600;

/// Fallback device paths for `"auto"` when discovery finds nothing
const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyACM0", // USB CDC devices (most common for CRSF modules)
    "/dev/ttyUSB0", // USB-to-serial adapters
];

/// Whether `baud_rate` is in [`SUPPORTED_BAUD_RATES`].
pub fn is_supported_baud_rate(baud_rate: u32) -> bool {
    SUPPORTED_BAUD_RATES.contains(&baud_rate)
}

/// The next supported baud rate above `current`, wrapping to the lowest.
///
/// # Examples
///
/// ```
/// use crsf_bridge::serial::next_baud_rate;
///
/// assert_eq!(next_baud_rate(115_200), 400_000);
/// assert_eq!(next_baud_rate(5_250_000), 9_600);
/// ```
pub fn next_baud_rate(current: u32) -> u32 {
    SUPPORTED_BAUD_RATES
        .iter()
        .copied()
        .find(|&rate| rate > current)
        .unwrap_or(SUPPORTED_BAUD_RATES[0])
}

/// Names of the serial ports present on this system.
///
/// # Errors
///
/// Returns `Serial` if the platform enumeration fails.
pub fn list_ports() -> Result<Vec<String>> {
    let ports = tokio_serial::available_ports()
        .map_err(|e| BridgeError::Serial(format!("Failed to list serial ports: {}", e)))?;

    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

/// Turn a configured port name into a device path.
///
/// `"auto"` (or an empty name) picks the first discovered port, then the
/// first existing default device path. Any other name is used as is.
///
/// # Errors
///
/// Returns `SerialPortNotFound` if `"auto"` finds no candidate.
pub fn resolve_port(configured: &str) -> Result<String> {
    let configured = configured.trim();
    if !configured.is_empty() && !configured.eq_ignore_ascii_case(AUTO_PORT) {
        return Ok(configured.to_string());
    }

    let discovered = list_ports().unwrap_or_default();
    debug!("Discovered serial ports: {:?}", discovered);

    let candidates: Vec<&str> = discovered
        .iter()
        .map(String::as_str)
        .chain(DEFAULT_DEVICE_PATHS.iter().copied())
        .collect();

    select_port(&discovered, DEFAULT_DEVICE_PATHS)
        .ok_or_else(|| BridgeError::SerialPortNotFound(candidates.join(", ")))
}

/// First discovered port, else the first fallback path that exists.
fn select_port(discovered: &[String], fallbacks: &[&str]) -> Option<String> {
    discovered.first().cloned().or_else(|| {
        fallbacks
            .iter()
            .find(|path| Path::new(path).exists())
            .map(|path| path.to_string())
    })
}

/// Open a specific serial port with CRSF settings
fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
    let port = tokio_serial::new(path, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| BridgeError::Serial(format!("Failed to open {}: {}", path, e)))?;

    Ok(port)
}

/// Opens real serial ports through `tokio-serial`
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialOpener;

impl PortOpener for SerialOpener {
    /// Resolve `path` (which may be `"auto"`) and open it at `baud_rate`.
    ///
    /// Must be called from within a tokio runtime.
    fn open(&self, path: &str, baud_rate: u32) -> Result<Box<dyn SerialPortIO>> {
        if !is_supported_baud_rate(baud_rate) {
            return Err(BridgeError::Serial(format!(
                "Unsupported baud rate {}",
                baud_rate
            )));
        }

        let device_path = resolve_port(path)?;
        let port = open_port(&device_path, baud_rate)?;
        info!("Opened serial port {} at {} baud", device_path, baud_rate);

        Ok(Box::new(TokioSerialPort::new(port)))
    }
}
