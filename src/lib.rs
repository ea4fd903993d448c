//! # FPV Telemetry Library
//!
//! Decode, record and replay FPV aircraft telemetry streams.
//!
//! The core is a resynchronizing frame decoder ([`protocol::decoder`])
//! consumed two ways: a live [`session::TelemetrySession`] pumping bytes
//! from a radio link, and a [`player::LogPlayer`] replaying a recorded
//! session with scrub-anywhere seeking. Both deliver the same
//! [`event::TelemetryEvent`] stream through the same listener contract.

pub mod config;
pub mod error;
pub mod event;
pub mod player;
pub mod protocol;
pub mod serial;
pub mod session;
