//! # Error Types
//!
//! Custom error types for FPV Telemetry using `thiserror`.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for FPV Telemetry
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Serial transport errors
    #[error("Serial port error: {0}")]
    Serial(String),

    /// No usable serial device was found
    #[error("No serial device found (tried: {0})")]
    SerialPortNotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A connect was attempted while a session was already active
    #[error("Session is not idle")]
    SessionBusy,

    /// The session log file contains no bytes at all
    #[error("Log file is empty: {}", .0.display())]
    EmptyLog(PathBuf),

    /// Log loading was cancelled before the timeline was built
    #[error("Log loading was cancelled")]
    LoadCancelled,

    /// The background decode task died without producing a timeline
    #[error("Log decode task failed")]
    LoadFailed,

    /// A seek target outside the loaded timeline
    #[error("Seek position {position} out of range (timeline has {total} events)")]
    SeekOutOfRange { position: usize, total: usize },
}

/// Result type alias for FPV Telemetry
pub type Result<T> = std::result::Result<T, TelemetryError>;
