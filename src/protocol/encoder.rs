//! # Link Frame Encoder
//!
//! Builds complete link protocol frames (sync + length + type + payload +
//! CRC). The library itself only decodes; the encoder exists for tests,
//! stream generators and ground-side tooling.

use super::crc::crc8_dvb_s2;
use super::link::*;
use crate::event::FlyMode;

/// Encode a complete frame for an arbitrary frame type and payload
///
/// # Arguments
///
/// * `frame_type` - Frame type byte
/// * `payload` - Payload data (at most 60 bytes)
///
/// # Panics
///
/// Panics if the payload does not fit the length field; encoders are
/// driven with fixed-size payloads, so this is a programming error.
pub fn frame(frame_type: u8, payload: &[u8]) -> Vec<u8> {
    let length = 1 + payload.len() + 1;
    assert!(
        length <= LINK_MAX_LENGTH as usize,
        "Payload of {} bytes exceeds the link frame size",
        payload.len()
    );

    let mut frame = Vec::with_capacity(2 + length);
    frame.push(LINK_SYNC_BYTE);
    frame.push(length as u8);
    frame.push(frame_type);
    frame.extend_from_slice(payload);
    frame.push(crc8_dvb_s2(&frame[1..]));
    frame
}

/// Encode a flight mode frame
pub fn flight_mode(
    armed: bool,
    heading_mode: bool,
    primary: FlyMode,
    secondary: Option<FlyMode>,
) -> Vec<u8> {
    let flags = (armed as u8) | ((heading_mode as u8) << 1);
    let payload = [
        flags,
        fly_mode_byte(primary),
        secondary.map_or(0xFF, fly_mode_byte),
    ];
    frame(FRAME_FLIGHT_MODE, &payload)
}

/// Encode a vertical speed frame (m/s)
pub fn vertical_speed(mps: f32) -> Vec<u8> {
    frame(FRAME_VERTICAL_SPEED, &mps.to_be_bytes())
}

/// Encode a barometric altitude frame (meters)
pub fn altitude(meters: f32) -> Vec<u8> {
    frame(FRAME_ALTITUDE, &meters.to_be_bytes())
}

/// Encode a GPS altitude frame (meters)
pub fn gps_altitude(meters: f32) -> Vec<u8> {
    frame(FRAME_GPS_ALTITUDE, &meters.to_be_bytes())
}

/// Encode a home distance frame (meters)
pub fn distance(meters: i32) -> Vec<u8> {
    frame(FRAME_DISTANCE, &meters.to_be_bytes())
}

/// Encode a roll angle frame (degrees)
pub fn roll(degrees: f32) -> Vec<u8> {
    frame(FRAME_ROLL, &degrees.to_be_bytes())
}

/// Encode a pitch angle frame (degrees)
pub fn pitch(degrees: f32) -> Vec<u8> {
    frame(FRAME_PITCH, &degrees.to_be_bytes())
}

/// Encode a ground speed frame (km/h)
pub fn ground_speed(kmh: f32) -> Vec<u8> {
    frame(FRAME_GROUND_SPEED, &kmh.to_be_bytes())
}

/// Encode a heading frame (degrees, 0..360)
pub fn heading(degrees: f32) -> Vec<u8> {
    frame(FRAME_HEADING, &degrees.to_be_bytes())
}

/// Encode a GPS receiver state frame
pub fn gps_state(satellites: u8, has_fix: bool) -> Vec<u8> {
    frame(FRAME_GPS_STATE, &[satellites, has_fix as u8])
}

/// Encode an RSSI frame (dBm, signed)
pub fn rssi(dbm: i8) -> Vec<u8> {
    frame(FRAME_RSSI, &[dbm as u8])
}

/// Encode a pack voltage frame (volts)
pub fn battery_voltage(volts: f32) -> Vec<u8> {
    frame(FRAME_BATTERY_VOLTAGE, &volts.to_be_bytes())
}

/// Encode a cell voltage frame (volts)
pub fn cell_voltage(volts: f32) -> Vec<u8> {
    frame(FRAME_CELL_VOLTAGE, &volts.to_be_bytes())
}

/// Encode a current draw frame (amperes)
pub fn current(amps: f32) -> Vec<u8> {
    frame(FRAME_CURRENT, &amps.to_be_bytes())
}

/// Encode a fuel percentage frame (0-100)
pub fn fuel(percent: u8) -> Vec<u8> {
    frame(FRAME_FUEL, &[percent])
}

/// Encode a GPS position frame (degrees)
pub fn gps_position(latitude: f64, longitude: f64) -> Vec<u8> {
    let lat_raw = (latitude * 10_000_000.0) as i32;
    let lon_raw = (longitude * 10_000_000.0) as i32;

    let mut payload = [0u8; GPS_POSITION_PAYLOAD_SIZE];
    payload[..4].copy_from_slice(&lat_raw.to_be_bytes());
    payload[4..].copy_from_slice(&lon_raw.to_be_bytes());
    frame(FRAME_GPS_POSITION, &payload)
}

/// Wire byte for a flight mode
fn fly_mode_byte(mode: FlyMode) -> u8 {
    match mode {
        FlyMode::Acro => 0x00,
        FlyMode::Horizon => 0x01,
        FlyMode::Angle => 0x02,
        FlyMode::Failsafe => 0x03,
        FlyMode::ReturnToHome => 0x04,
        FlyMode::Waypoint => 0x05,
        FlyMode::Manual => 0x06,
        FlyMode::Cruise => 0x07,
    }
}
