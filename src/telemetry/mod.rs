//! Telemetry bus publishing

mod mqtt;

pub use mqtt::{MqttPublisher, MqttSink};

use crate::error::Result;
use crate::reading::Reading;

/// Destination for normalized readings.
///
/// Device drivers publish through this seam rather than holding a broker
/// client, so protocol loops can run against an in-memory sink in tests.
/// Publishing is fire-and-forget: implementations must not block the
/// calling sensor loop on bus availability.
pub trait ReadingSink: Send {
    fn publish(&mut self, reading: &Reading) -> Result<()>;
}
