//! Sensor acquisition and correction relay for a mobile rover
//!
//! The daemon reads two positioning sensors concurrently and keeps the
//! GNSS receiver fed with corrections:
//!
//! - `devices::ublox` polls the receiver for UBX-NAV-PVT solutions
//! - `devices::decawave` streams position estimates from the UWB tag
//! - `correction` relays RTCM or SPARTN bytes into the receiver
//! - `telemetry` publishes normalized readings to the MQTT broker
//! - `imu` supervises the external inertial pipeline process
//!
//! Each reader runs on its own thread with a cooperative stop signal;
//! the `app` module wires them together.

pub mod app;
pub mod config;
pub mod correction;
pub mod devices;
pub mod error;
pub mod imu;
pub mod reading;
pub mod stop;
pub mod telemetry;
pub mod transport;

// Re-export commonly used types
pub use error::{Error, Result};
