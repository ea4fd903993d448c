//! # Reference Link Protocol
//!
//! The concrete telemetry frame protocol spoken by the radio bridge.
//!
//! Frame layout:
//!
//! ```text
//! sync(0x7E) | length(1) | type(1) | payload(N) | crc8_dvb_s2(1)
//! ```
//!
//! `length` counts type + payload + crc. The CRC spans length, type and
//! payload. All multi-byte payload fields are big-endian.

use super::crc::crc8_dvb_s2;
use super::FrameProtocol;
use crate::event::{FlyMode, GeoPoint, TelemetryEvent};

/// Frame sync byte (always 0x7E)
pub const LINK_SYNC_BYTE: u8 = 0x7E;

/// Smallest valid `length` field value (type + empty payload + crc)
pub const LINK_MIN_LENGTH: u8 = 2;

/// Largest valid `length` field value
///
/// Frames are capped at 64 bytes on the wire, so length = 64 - 2.
pub const LINK_MAX_LENGTH: u8 = 62;

/// Flight mode frame type
pub const FRAME_FLIGHT_MODE: u8 = 0x01;
/// Vertical speed frame type
pub const FRAME_VERTICAL_SPEED: u8 = 0x02;
/// Barometric altitude frame type
pub const FRAME_ALTITUDE: u8 = 0x03;
/// GPS altitude frame type
pub const FRAME_GPS_ALTITUDE: u8 = 0x04;
/// Home distance frame type
pub const FRAME_DISTANCE: u8 = 0x05;
/// Roll angle frame type
pub const FRAME_ROLL: u8 = 0x06;
/// Pitch angle frame type
pub const FRAME_PITCH: u8 = 0x07;
/// Ground speed frame type
pub const FRAME_GROUND_SPEED: u8 = 0x08;
/// Heading frame type
pub const FRAME_HEADING: u8 = 0x09;
/// GPS receiver state frame type
pub const FRAME_GPS_STATE: u8 = 0x0A;
/// RSSI frame type
pub const FRAME_RSSI: u8 = 0x0B;
/// Pack voltage frame type
pub const FRAME_BATTERY_VOLTAGE: u8 = 0x0C;
/// Cell voltage frame type
pub const FRAME_CELL_VOLTAGE: u8 = 0x0D;
/// Current draw frame type
pub const FRAME_CURRENT: u8 = 0x0E;
/// Fuel percentage frame type
pub const FRAME_FUEL: u8 = 0x0F;
/// GPS position frame type
pub const FRAME_GPS_POSITION: u8 = 0x10;

/// Flight mode payload size (flags + primary + secondary)
pub const FLIGHT_MODE_PAYLOAD_SIZE: usize = 3;

/// GPS position payload size (lat i32 + lon i32, degrees x 10^7)
pub const GPS_POSITION_PAYLOAD_SIZE: usize = 8;

/// Secondary flight mode byte meaning "none"
const FLIGHT_MODE_NONE: u8 = 0xFF;

/// The reference link protocol
///
/// Stateless; plug it into
/// [`StreamDecoder`](super::decoder::StreamDecoder) for stream decoding or
/// call [`decode`](FrameProtocol::decode) on a complete frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinkProtocol;

impl FrameProtocol for LinkProtocol {
    fn sync_byte(&self) -> u8 {
        LINK_SYNC_BYTE
    }

    fn header_len(&self) -> usize {
        // Just the length byte; the frame type sits inside the counted span
        1
    }

    fn frame_len(&self, header: &[u8]) -> Option<usize> {
        let length = header[0];
        if (LINK_MIN_LENGTH..=LINK_MAX_LENGTH).contains(&length) {
            // sync + length byte + counted span
            Some(2 + length as usize)
        } else {
            None
        }
    }

    fn validate(&self, frame: &[u8]) -> bool {
        // CRC over Length + Type + Payload, compared to the trailing byte
        let crc_index = frame.len() - 1;
        crc8_dvb_s2(&frame[1..crc_index]) == frame[crc_index]
    }

    fn decode(&self, frame: &[u8]) -> Option<TelemetryEvent> {
        let frame_type = frame[2];
        let payload = &frame[3..frame.len() - 1];

        match frame_type {
            FRAME_FLIGHT_MODE => decode_flight_mode(payload),
            FRAME_VERTICAL_SPEED => Some(TelemetryEvent::VerticalSpeed(decode_f32(payload)?)),
            FRAME_ALTITUDE => Some(TelemetryEvent::Altitude(decode_f32(payload)?)),
            FRAME_GPS_ALTITUDE => Some(TelemetryEvent::GpsAltitude(decode_f32(payload)?)),
            FRAME_DISTANCE => Some(TelemetryEvent::Distance(decode_i32(payload)?)),
            FRAME_ROLL => Some(TelemetryEvent::Roll(decode_f32(payload)?)),
            FRAME_PITCH => Some(TelemetryEvent::Pitch(decode_f32(payload)?)),
            FRAME_GROUND_SPEED => Some(TelemetryEvent::GroundSpeed(decode_f32(payload)?)),
            FRAME_HEADING => Some(TelemetryEvent::Heading(decode_f32(payload)?)),
            FRAME_GPS_STATE => decode_gps_state(payload),
            FRAME_RSSI => Some(TelemetryEvent::Rssi(*payload.first()? as i8 as i32)),
            FRAME_BATTERY_VOLTAGE => Some(TelemetryEvent::BatteryVoltage(decode_f32(payload)?)),
            FRAME_CELL_VOLTAGE => Some(TelemetryEvent::CellVoltage(decode_f32(payload)?)),
            FRAME_CURRENT => Some(TelemetryEvent::Current(decode_f32(payload)?)),
            FRAME_FUEL => Some(TelemetryEvent::Fuel(*payload.first()? as u32)),
            FRAME_GPS_POSITION => decode_gps_position(payload),
            // Unknown frame type: firmware newer than this decoder
            _ => None,
        }
    }
}

/// Decode a big-endian f32 payload
fn decode_f32(payload: &[u8]) -> Option<f32> {
    let bytes: [u8; 4] = payload.get(..4)?.try_into().ok()?;
    Some(f32::from_be_bytes(bytes))
}

/// Decode a big-endian i32 payload
fn decode_i32(payload: &[u8]) -> Option<i32> {
    let bytes: [u8; 4] = payload.get(..4)?.try_into().ok()?;
    Some(i32::from_be_bytes(bytes))
}

/// Decode a flight mode payload (flags, primary, secondary)
fn decode_flight_mode(payload: &[u8]) -> Option<TelemetryEvent> {
    if payload.len() < FLIGHT_MODE_PAYLOAD_SIZE {
        return None;
    }

    let flags = payload[0];
    let primary = fly_mode_from_byte(payload[1])?;
    let secondary = if payload[2] == FLIGHT_MODE_NONE {
        None
    } else {
        Some(fly_mode_from_byte(payload[2])?)
    };

    Some(TelemetryEvent::FlightMode {
        armed: flags & 0x01 != 0,
        heading_mode: flags & 0x02 != 0,
        primary,
        secondary,
    })
}

/// Decode a GPS receiver state payload (satellites, fix flag)
fn decode_gps_state(payload: &[u8]) -> Option<TelemetryEvent> {
    if payload.len() < 2 {
        return None;
    }

    Some(TelemetryEvent::GpsState {
        satellites: payload[0] as u32,
        has_fix: payload[1] != 0,
    })
}

/// Decode a GPS position payload (lat, lon as degrees x 10^7)
///
/// A live position update is always a single point appended to the path;
/// full-path replacement only ever comes from the log player.
fn decode_gps_position(payload: &[u8]) -> Option<TelemetryEvent> {
    if payload.len() < GPS_POSITION_PAYLOAD_SIZE {
        return None;
    }

    let lat_raw = i32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
    let lon_raw = i32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]);

    Some(TelemetryEvent::GpsPosition {
        points: vec![GeoPoint::new(
            lat_raw as f64 / 10_000_000.0,
            lon_raw as f64 / 10_000_000.0,
        )],
        append: true,
    })
}

/// Map a wire mode byte to a flight mode
fn fly_mode_from_byte(byte: u8) -> Option<FlyMode> {
    match byte {
        0x00 => Some(FlyMode::Acro),
        0x01 => Some(FlyMode::Horizon),
        0x02 => Some(FlyMode::Angle),
        0x03 => Some(FlyMode::Failsafe),
        0x04 => Some(FlyMode::ReturnToHome),
        0x05 => Some(FlyMode::Waypoint),
        0x06 => Some(FlyMode::Manual),
        0x07 => Some(FlyMode::Cruise),
        _ => None,
    }
}
