//! # Resynchronizing Stream Decoder
//!
//! Turns a continuous, possibly corrupted or fragmented byte stream into
//! telemetry events. The decoder is pure and transport-agnostic: it performs
//! no I/O and is driven identically by the live session and the log player.
//!
//! There is no decode error that halts a session. Noise bytes, bad
//! checksums and unknown frame types are all self-healing: the decoder
//! scans forward to the next plausible frame marker and carries on. The
//! only externally visible effect of malformed input is missing events.

use bytes::{Buf, BytesMut};
use tracing::{debug, trace};

use super::link::LinkProtocol;
use super::FrameProtocol;
use crate::event::EventListener;

/// Streaming frame decoder
///
/// Owns the byte accumulation buffer; the protocol-specific knowledge is
/// supplied by a [`FrameProtocol`] implementation. Create one per session
/// (live or replay) and drop it when the session ends - it carries no
/// cross-session state. Not internally synchronized: drive it from a
/// single caller at a time.
#[derive(Debug)]
pub struct StreamDecoder<P: FrameProtocol = LinkProtocol> {
    /// Protocol slotted into the state machine
    protocol: P,

    /// Bytes received but not yet consumed as a complete frame
    buffer: BytesMut,
}

impl StreamDecoder<LinkProtocol> {
    /// Create a decoder for the reference link protocol
    pub fn new() -> Self {
        Self::with_protocol(LinkProtocol)
    }
}

impl Default for StreamDecoder<LinkProtocol> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: FrameProtocol> StreamDecoder<P> {
    /// Create a decoder for an arbitrary frame protocol
    pub fn with_protocol(protocol: P) -> Self {
        Self {
            protocol,
            buffer: BytesMut::with_capacity(256),
        }
    }

    /// Feed received bytes into the decoder
    ///
    /// Every complete, valid frame formed by the buffered bytes is decoded
    /// and its event pushed to `listener` synchronously, in arrival order,
    /// before `feed` returns. Bytes forming no complete frame yet stay
    /// buffered for the next call, so arbitrary chunking of the input
    /// stream yields the same event sequence as a single call.
    pub fn feed(&mut self, bytes: &[u8], listener: &mut dyn EventListener) {
        self.buffer.extend_from_slice(bytes);

        loop {
            // Resynchronize: discard everything before the next frame marker
            let sync = self.protocol.sync_byte();
            match self.buffer.iter().position(|&b| b == sync) {
                Some(0) => {}
                Some(noise) => {
                    trace!("Discarding {} noise bytes before sync", noise);
                    self.buffer.advance(noise);
                }
                None => {
                    if !self.buffer.is_empty() {
                        trace!("Discarding {} noise bytes (no sync)", self.buffer.len());
                        self.buffer.clear();
                    }
                    return;
                }
            }

            // Header: wait until the declared frame length is knowable
            let header_len = self.protocol.header_len();
            if self.buffer.len() < 1 + header_len {
                return;
            }

            let frame_len = match self.protocol.frame_len(&self.buffer[1..1 + header_len]) {
                Some(len) => len,
                None => {
                    // Implausible length: the marker was noise
                    debug!("Implausible frame length after sync, resynchronizing");
                    self.buffer.advance(1);
                    continue;
                }
            };

            // Payload: wait for the rest of the frame
            if self.buffer.len() < frame_len {
                return;
            }

            let frame = &self.buffer[..frame_len];
            if !self.protocol.validate(frame) {
                // Drop only the marker byte: a later marker inside this
                // span may start the real frame
                debug!("Frame checksum mismatch, resynchronizing");
                self.buffer.advance(1);
                continue;
            }

            match self.protocol.decode(frame) {
                Some(event) => listener.on_event(event),
                None => debug!("Skipping unrecognized frame ({} bytes)", frame_len),
            }
            self.buffer.advance(frame_len);
        }
    }

    /// Number of buffered bytes not yet forming a complete frame
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TelemetryEvent;
    use crate::protocol::encoder;

    /// Feed `bytes` to a fresh decoder and collect every emitted event
    fn decode_all(bytes: &[u8]) -> Vec<TelemetryEvent> {
        let mut decoder = StreamDecoder::new();
        let mut events = Vec::new();
        decoder.feed(bytes, &mut |event: TelemetryEvent| events.push(event));
        events
    }

    fn sample_stream() -> Vec<u8> {
        let mut stream = Vec::new();
        stream.extend(encoder::altitude(120.0));
        stream.extend(encoder::gps_position(48.1, 11.5));
        stream.extend(encoder::fuel(88));
        stream.extend(encoder::rssi(-60));
        stream.extend(encoder::gps_state(9, true));
        stream
    }

    #[test]
    fn test_decode_clean_stream() {
        let events = decode_all(&sample_stream());
        assert_eq!(events.len(), 5);
        assert_eq!(events[2], TelemetryEvent::Fuel(88));
        assert_eq!(events[3], TelemetryEvent::Rssi(-60));
    }

    #[test]
    fn test_chunking_invariance() {
        let stream = sample_stream();
        let whole = decode_all(&stream);

        // Every chunk size, including 1-byte feeds that split headers,
        // payloads and checksums
        for chunk_size in 1..=stream.len() {
            let mut decoder = StreamDecoder::new();
            let mut events = Vec::new();
            for chunk in stream.chunks(chunk_size) {
                decoder.feed(chunk, &mut |event: TelemetryEvent| events.push(event));
            }
            assert_eq!(
                events, whole,
                "Chunk size {} changed the event sequence",
                chunk_size
            );
        }
    }

    #[test]
    fn test_resync_over_injected_garbage() {
        let clean = sample_stream();
        let expected = decode_all(&clean);

        let mut noisy = Vec::new();
        noisy.extend_from_slice(&[0x00, 0x13, 0x37]);
        for frame in [
            encoder::altitude(120.0),
            encoder::gps_position(48.1, 11.5),
            encoder::fuel(88),
            encoder::rssi(-60),
            encoder::gps_state(9, true),
        ] {
            noisy.extend(frame);
            noisy.extend_from_slice(&[0xBA, 0xAD, 0xF0, 0x0D]);
        }

        assert_eq!(decode_all(&noisy), expected);
    }

    #[test]
    fn test_corrupt_frame_drops_only_its_event() {
        let mut stream = encoder::altitude(120.0);
        let mut corrupt = encoder::fuel(88);
        corrupt[3] ^= 0xFF; // break the payload, CRC will not match
        stream.extend(corrupt);
        stream.extend(encoder::rssi(-60));

        let events = decode_all(&stream);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], TelemetryEvent::Altitude(_)));
        assert_eq!(events[1], TelemetryEvent::Rssi(-60));
    }

    #[test]
    fn test_unknown_frame_type_is_skipped() {
        let mut stream = encoder::frame(0x7F, &[0x01, 0x02, 0x03]);
        stream.extend(encoder::fuel(42));

        let events = decode_all(&stream);
        assert_eq!(events, vec![TelemetryEvent::Fuel(42)]);
    }

    #[test]
    fn test_partial_frame_waits_for_more_bytes() {
        let frame = encoder::gps_position(1.0, 2.0);
        let (head, tail) = frame.split_at(4);

        let mut decoder = StreamDecoder::new();
        let mut events = Vec::new();
        decoder.feed(head, &mut |event: TelemetryEvent| events.push(event));
        assert!(events.is_empty(), "No partial parse");
        assert_eq!(decoder.pending(), head.len());

        decoder.feed(tail, &mut |event: TelemetryEvent| events.push(event));
        assert_eq!(events.len(), 1);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_noise_without_sync_is_discarded() {
        let mut decoder = StreamDecoder::new();
        let mut events = Vec::new();
        decoder.feed(&[0x00, 0x01, 0x02, 0xFF], &mut |event: TelemetryEvent| events.push(event));
        assert!(events.is_empty());
        assert_eq!(decoder.pending(), 0, "Noise must not accumulate");
    }

    #[test]
    fn test_implausible_length_resyncs() {
        // A stray sync byte followed by an invalid length, then a real frame
        let mut stream = vec![0x7E, 0xFF];
        stream.extend(encoder::fuel(13));

        assert_eq!(decode_all(&stream), vec![TelemetryEvent::Fuel(13)]);
    }

    #[test]
    fn test_sync_byte_inside_payload() {
        // 0x7E00007E00 as big-endian f32 payload bytes: craft an altitude
        // whose payload contains the sync byte
        let frame = encoder::frame(
            crate::protocol::link::FRAME_ALTITUDE,
            &[0x7E, 0x00, 0x7E, 0x00],
        );
        let mut stream = frame.clone();
        stream.extend(encoder::fuel(7));

        let events = decode_all(&stream);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], TelemetryEvent::Altitude(_)));
        assert_eq!(events[1], TelemetryEvent::Fuel(7));
    }

    #[test]
    fn test_truncated_stream_keeps_leading_events() {
        let mut stream = sample_stream();
        stream.truncate(stream.len() - 3); // cut into the last frame

        let events = decode_all(&stream);
        assert_eq!(events.len(), 4);
    }

    #[test]
    fn test_decoder_is_reusable_across_feeds() {
        let mut decoder = StreamDecoder::new();
        let mut events = Vec::new();
        for _ in 0..3 {
            decoder.feed(&encoder::fuel(1), &mut |event: TelemetryEvent| events.push(event));
        }
        assert_eq!(events.len(), 3);
    }
}
