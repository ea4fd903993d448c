//! # Session Log Recording
//!
//! Appends the raw protocol bytes of a live session to a file, exactly as
//! received and with no added framing, so replaying the file through the
//! frame decoder reproduces the live event sequence byte-for-byte.
//!
//! Recording is best-effort: a failed write is reported once and disables
//! further recording, but never interferes with live decoding.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{info, warn};

use crate::error::Result;

/// File extension for session logs
pub const LOG_EXTENSION: &str = "log";

/// Append-only raw-byte session recording
#[derive(Debug)]
pub struct SessionLog {
    /// Open log file; `None` once a write has failed
    file: Option<File>,

    /// Where the recording lives
    path: PathBuf,
}

impl SessionLog {
    /// Create a session log at an explicit path
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created
    pub fn create<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path)?;
        info!("Recording session to {}", path.display());

        Ok(Self {
            file: Some(file),
            path,
        })
    }

    /// Create a timestamped session log inside a directory
    ///
    /// The directory is created if missing. File names follow the
    /// `telemetry_YYYY-MM-DD_HH-MM-SS.log` convention.
    pub fn create_in<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let name = format!(
            "telemetry_{}.{}",
            Local::now().format("%Y-%m-%d_%H-%M-%S"),
            LOG_EXTENSION
        );
        Self::create(dir.join(name))
    }

    /// Path of the recording
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append raw bytes, best-effort
    ///
    /// The first failed write disables the recording; the session keeps
    /// running.
    pub fn append(&mut self, bytes: &[u8]) {
        if let Some(file) = self.file.as_mut() {
            if let Err(e) = file.write_all(bytes) {
                warn!(
                    "Session log write to {} failed, recording stops: {}",
                    self.path.display(),
                    e
                );
                self.file = None;
            }
        }
    }

    /// Whether the recording is still being written
    pub fn is_recording(&self) -> bool {
        self.file.is_some()
    }

    /// Flush and close the recording
    pub fn finish(mut self) {
        if let Some(mut file) = self.file.take() {
            if let Err(e) = file.flush().and_then(|_| file.sync_all()) {
                warn!("Failed to flush session log: {}", e);
            } else {
                info!("Session log closed: {}", self.path.display());
            }
        }
    }
}
