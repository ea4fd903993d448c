//! # Serial Transport Module
//!
//! Opens the serial link to the ground-side telemetry radio. The returned
//! stream is a plain `AsyncRead` byte source; everything above it
//! (decoding, logging, lifecycle) lives in [`crate::session`].

use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use crate::error::{Result, TelemetryError};

/// Default baud rate of the telemetry radio
pub const DEFAULT_BAUD_RATE: u32 = 57_600;

/// Default device paths to try (in order of preference)
const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyUSB0", // USB-to-serial adapters (most common for radios)
    "/dev/ttyACM0", // USB CDC devices
];

/// Open a specific serial port with telemetry link settings (8N1)
///
/// # Arguments
///
/// * `path` - Device path (e.g., "/dev/ttyUSB0")
/// * `baud_rate` - Link baud rate
///
/// # Errors
///
/// Returns error if the device cannot be opened
pub fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
    let port = tokio_serial::new(path, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| TelemetryError::Serial(format!("Failed to open {}: {}", path, e)))?;

    Ok(port)
}

/// Open the first usable device from a list of candidate paths
///
/// # Arguments
///
/// * `paths` - Device paths to try in order
/// * `baud_rate` - Link baud rate
///
/// # Errors
///
/// Returns [`TelemetryError::SerialPortNotFound`] if none of the paths
/// could be opened
pub fn open_any(paths: &[&str], baud_rate: u32) -> Result<tokio_serial::SerialStream> {
    for path in paths {
        debug!("Trying to open serial port: {}", path);

        match open_port(path, baud_rate) {
            Ok(port) => {
                info!("Opened telemetry radio at {}", path);
                return Ok(port);
            }
            Err(e) => {
                warn!("Failed to open {}: {}", path, e);
                continue;
            }
        }
    }

    Err(TelemetryError::SerialPortNotFound(paths.join(", ")))
}

/// Open the radio using the default device path list
pub fn open_default(baud_rate: u32) -> Result<tokio_serial::SerialStream> {
    open_any(DEFAULT_DEVICE_PATHS, baud_rate)
}
