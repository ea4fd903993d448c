//! # Log Player Module
//!
//! Replays a recorded session log. The whole file is decoded ahead of time
//! on a blocking worker into an immutable [`TimelineIndex`]; afterwards
//! [`LogPlayer::seek`] is a pure in-memory lookup, cheap enough to drive
//! from a position slider.
//!
//! Seeking must recreate the presentation state a live session would have
//! had at the target position. Point-in-time readings only need the single
//! event stored there; the cumulative flight path is the subtle part:
//! scrubbing forward appends just the new points, scrubbing backward
//! re-emits the full path from the start because an append cannot be
//! undone. Forward is the common interaction and stays O(distance moved);
//! backward is O(position).

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{Result, TelemetryError};
use crate::event::{EventListener, GeoPoint, TelemetryEvent};
use crate::protocol::decoder::StreamDecoder;

/// Read granularity of the decode-ahead pass
const LOAD_CHUNK_SIZE: usize = 4096;

/// Immutable, seekable event timeline of a decoded session log
///
/// Position `i` is the `i`-th decoded event. Alongside the events the
/// index stores the flat sequence of GPS points and, per position, how
/// many of those points the path had accumulated by then - enough to
/// redraw the full path for any seek target without re-decoding.
#[derive(Debug, Default)]
pub struct TimelineIndex {
    /// Decoded events in decode order
    events: Vec<TelemetryEvent>,

    /// Every GPS point of the recording, in decode order
    path: Vec<GeoPoint>,

    /// Cumulative GPS point count through each position
    path_len_at: Vec<usize>,
}

impl TimelineIndex {
    fn push(&mut self, event: TelemetryEvent) {
        if let TelemetryEvent::GpsPosition { points, .. } = &event {
            // Live decode only ever appends single points
            self.path.extend_from_slice(points);
        }
        self.path_len_at.push(self.path.len());
        self.events.push(event);
    }

    /// Number of indexed events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the log decoded to no events at all
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// In-progress decode-ahead of a session log
///
/// Created by [`LogLoader::spawn`]; resolves to a ready [`LogPlayer`]
/// through [`LogLoader::finish`]. Cancelling discards all partial state -
/// a partially built timeline is never exposed.
#[derive(Debug)]
pub struct LogLoader {
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<Result<TimelineIndex>>,
}

impl LogLoader {
    /// Start decoding a session log on a blocking worker
    ///
    /// `progress` receives coarse percent-complete values (0-100,
    /// non-decreasing, always ending at 100 on success), invoked on the
    /// worker.
    pub fn spawn<P, F>(path: P, progress: F) -> Self
    where
        P: Into<PathBuf>,
        F: FnMut(u8) + Send + 'static,
    {
        let path = path.into();
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);
        let handle = tokio::task::spawn_blocking(move || decode_file(&path, &flag, progress));

        Self { cancel, handle }
    }

    /// Request prompt cancellation of the decode
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Wait for the decode to finish and obtain the player
    ///
    /// # Errors
    ///
    /// - [`TelemetryError::EmptyLog`] / [`TelemetryError::Io`] when the
    ///   file is empty or unreadable (distinct from a readable log that
    ///   decodes to zero events, which succeeds)
    /// - [`TelemetryError::LoadCancelled`] after [`LogLoader::cancel`]
    pub async fn finish(self) -> Result<LogPlayer> {
        let index = self
            .handle
            .await
            .map_err(|_| TelemetryError::LoadFailed)??;

        Ok(LogPlayer {
            index,
            cursor: None,
        })
    }
}

/// Blocking decode-ahead: read the file in chunks through a fresh decoder
fn decode_file<F>(path: &Path, cancel: &AtomicBool, mut progress: F) -> Result<TimelineIndex>
where
    F: FnMut(u8),
{
    let mut file = File::open(path)?;
    let total_bytes = file.metadata()?.len();
    if total_bytes == 0 {
        return Err(TelemetryError::EmptyLog(path.to_path_buf()));
    }

    let mut decoder = StreamDecoder::new();
    let mut index = TimelineIndex::default();
    let mut buf = [0u8; LOAD_CHUNK_SIZE];
    let mut bytes_read: u64 = 0;
    let mut last_percent: u8 = 0;
    progress(0);

    loop {
        if cancel.load(Ordering::Relaxed) {
            debug!("Log decode cancelled after {} bytes", bytes_read);
            return Err(TelemetryError::LoadCancelled);
        }

        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        bytes_read += n as u64;

        decoder.feed(&buf[..n], &mut |event: TelemetryEvent| index.push(event));

        let percent = (bytes_read * 100 / total_bytes).min(100) as u8;
        if percent != last_percent {
            last_percent = percent;
            progress(percent);
        }
    }

    if last_percent < 100 {
        progress(100);
    }

    info!(
        "Decoded {} events from {} ({} bytes)",
        index.len(),
        path.display(),
        bytes_read
    );
    Ok(index)
}

/// Seekable replay of a loaded session log
///
/// Holds the immutable timeline plus the sole piece of mutable state: the
/// last emitted position, used to decide between the incremental and the
/// full-rebuild path update. Drive it from one caller at a time.
#[derive(Debug)]
pub struct LogPlayer {
    index: TimelineIndex,
    cursor: Option<usize>,
}

impl LogPlayer {
    /// Total number of events on the timeline
    pub fn total_events(&self) -> usize {
        self.index.len()
    }

    /// Last emitted position, if any seek happened yet
    pub fn position(&self) -> Option<usize> {
        self.cursor
    }

    /// Re-emit the presentation state for `position`
    ///
    /// - Seeking to the last emitted position is a no-op.
    /// - Forward of it: a `GpsPosition` in append mode carrying exactly
    ///   the points of positions `(previous, position]`, when any.
    /// - Backward of it, or the first seek: a `GpsPosition` in non-append
    ///   mode carrying the full cumulative path of `[0, position]`.
    /// - The event stored at `position` is additionally emitted unless it
    ///   is itself a `GpsPosition` (already covered by the path update).
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::SeekOutOfRange`] when `position` is not
    /// below [`LogPlayer::total_events`].
    pub fn seek(&mut self, position: usize, listener: &mut dyn EventListener) -> Result<()> {
        let total = self.index.len();
        if position >= total {
            return Err(TelemetryError::SeekOutOfRange { position, total });
        }
        if self.cursor == Some(position) {
            return Ok(());
        }

        let new_len = self.index.path_len_at[position];
        match self.cursor {
            Some(previous) if position > previous => {
                let old_len = self.index.path_len_at[previous];
                if new_len > old_len {
                    listener.on_event(TelemetryEvent::GpsPosition {
                        points: self.index.path[old_len..new_len].to_vec(),
                        append: true,
                    });
                }
            }
            _ => {
                listener.on_event(TelemetryEvent::GpsPosition {
                    points: self.index.path[..new_len].to_vec(),
                    append: false,
                });
            }
        }

        let stored = &self.index.events[position];
        if !matches!(stored, TelemetryEvent::GpsPosition { .. }) {
            listener.on_event(stored.clone());
        }

        self.cursor = Some(position);
        Ok(())
    }
}
