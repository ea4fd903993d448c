//! # Telemetry Event Model
//!
//! Typed events produced by the frame decoder and the session, and the
//! listener contract through which every consumer (live UI, replay harness,
//! tests) receives them. A consumer cannot tell live data from replay: both
//! paths deliver the same event type through the same trait.

/// Flight mode reported by the flight controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlyMode {
    Acro,
    Horizon,
    Angle,
    Failsafe,
    ReturnToHome,
    Waypoint,
    Manual,
    Cruise,
}

/// A single GPS coordinate in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    /// Latitude in degrees
    pub latitude: f64,

    /// Longitude in degrees
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// Link state of a live session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    ConnectionFailed,
}

/// One decoded telemetry reading
///
/// Every variant is a self-contained point-in-time reading except
/// [`TelemetryEvent::GpsPosition`], which mutates the consumer's rendered
/// flight path incrementally: `append = true` extends the path with the
/// carried points, `append = false` replaces the whole path with them.
/// A live single-point GPS update is a length-1 `points` with `append = true`.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    /// Flight mode flags and up to two active modes
    FlightMode {
        armed: bool,
        heading_mode: bool,
        primary: FlyMode,
        secondary: Option<FlyMode>,
    },

    /// Vertical speed in m/s
    VerticalSpeed(f32),

    /// Barometric altitude in meters
    Altitude(f32),

    /// GPS altitude in meters
    GpsAltitude(f32),

    /// Distance from home in meters
    Distance(i32),

    /// Roll angle in degrees
    Roll(f32),

    /// Pitch angle in degrees
    Pitch(f32),

    /// Ground speed in km/h
    GroundSpeed(f32),

    /// Heading in degrees (0..360)
    Heading(f32),

    /// GPS receiver state
    GpsState { satellites: u32, has_fix: bool },

    /// Receiver signal strength
    Rssi(i32),

    /// Pack voltage in volts
    BatteryVoltage(f32),

    /// Per-cell voltage in volts
    CellVoltage(f32),

    /// Current draw in amperes
    Current(f32),

    /// Remaining fuel/battery percentage (0-100)
    Fuel(u32),

    /// Flight path update (see type-level docs for the append semantics)
    GpsPosition { points: Vec<GeoPoint>, append: bool },

    /// Session link state change; never decoded from the wire, only
    /// produced by the transport session
    ConnectionStatus(ConnectionStatus),
}

/// Consumer of decoded telemetry events
///
/// The single entry point replaces the one-callback-per-reading interface
/// style: matching on [`TelemetryEvent`] is exhaustive, so a consumer that
/// ignores a variant does so visibly.
///
/// Events are delivered synchronously on whichever worker decoded them, in
/// decode order. Implementations that need a specific thread (e.g. a UI
/// thread) do their own marshaling.
pub trait EventListener: Send {
    fn on_event(&mut self, event: TelemetryEvent);
}

/// Any `FnMut(TelemetryEvent)` closure is a listener; handy for tests and
/// simple consumers.
impl<F: FnMut(TelemetryEvent) + Send> EventListener for F {
    fn on_event(&mut self, event: TelemetryEvent) {
        self(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_is_a_listener() {
        let mut seen = Vec::new();
        {
            let mut listener = |event: TelemetryEvent| seen.push(event);
            let l: &mut dyn EventListener = &mut listener;
            l.on_event(TelemetryEvent::Fuel(42));
            l.on_event(TelemetryEvent::Rssi(-70));
        }
        assert_eq!(
            seen,
            vec![TelemetryEvent::Fuel(42), TelemetryEvent::Rssi(-70)]
        );
    }

    #[test]
    fn test_geo_point_equality() {
        assert_eq!(GeoPoint::new(0.0, 1.0), GeoPoint::new(0.0, 1.0));
        assert_ne!(GeoPoint::new(0.0, 1.0), GeoPoint::new(1.0, 0.0));
    }
}
