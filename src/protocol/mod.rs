//! # Telemetry Frame Protocol Module
//!
//! Wire-level handling of the telemetry stream.
//!
//! This module handles:
//! - The [`FrameProtocol`] contract any length-prefixed, checksummed frame
//!   protocol slots into
//! - The reference link protocol ([`link::LinkProtocol`])
//! - The resynchronizing stream decoder ([`decoder::StreamDecoder`])
//! - Frame construction for tests and tooling
//! - CRC8-DVB-S2 checksum calculation

pub mod crc;
pub mod decoder;
pub mod encoder;
pub mod link;

use crate::event::TelemetryEvent;

/// Contract between the stream decoder and a concrete frame protocol
///
/// The decoder owns buffering and resynchronization; the protocol supplies
/// the byte-level knowledge: where a frame starts, how long it claims to be,
/// whether it checks out, and what event it carries. Implementations are
/// stateless - all running decode state lives in the decoder.
pub trait FrameProtocol {
    /// Marker byte every frame starts with
    fn sync_byte(&self) -> u8;

    /// Bytes required after the sync byte before the total frame length
    /// can be determined
    fn header_len(&self) -> usize;

    /// Total frame length in bytes (sync through checksum inclusive),
    /// derived from the header bytes that follow the sync byte
    ///
    /// Returns `None` when the declared length is implausible, which makes
    /// the decoder treat the sync byte as noise and resynchronize.
    fn frame_len(&self, header: &[u8]) -> Option<usize>;

    /// Integrity check over a complete candidate frame
    fn validate(&self, frame: &[u8]) -> bool;

    /// Map a validated frame to the event it carries
    ///
    /// Returns `None` for frame types (or field values) this decoder
    /// version does not recognize; the decoder skips those silently.
    fn decode(&self, frame: &[u8]) -> Option<TelemetryEvent>;
}
