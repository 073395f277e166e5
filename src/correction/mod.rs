//! Correction relay
//!
//! One configured upstream source streams correction data (RTCM or SPARTN)
//! which is forwarded verbatim to the positioning receiver. The source
//! never inspects the bytes; framing and application happen inside the
//! receiver.

pub mod ntrip;
pub mod pointperfect;

pub use ntrip::NtripClient;
pub use pointperfect::PointPerfectClient;

use crate::config::CorrectionConfig;
use crate::error::{Error, Result};
use crate::stop::StopSignal;

/// Sink for raw correction bytes, implemented by the receiver handle
pub trait CorrectionWriter: Send + Sync {
    fn write(&self, bytes: &[u8]) -> Result<()>;
}

/// An upstream correction stream
pub trait CorrectionSource: Send {
    /// Stream corrections into the writer until stopped
    fn run(&mut self, writer: &dyn CorrectionWriter, stop: &StopSignal) -> Result<()>;
}

/// Create the correction source named by the configuration
pub fn create_source(config: &CorrectionConfig) -> Result<Box<dyn CorrectionSource>> {
    match config.service.as_str() {
        "ntrip" => Ok(Box::new(NtripClient::new(config.ntrip.clone()))),
        "pp" => Ok(Box::new(PointPerfectClient::new(config.pp.clone()))),
        _ => Err(Error::UnknownService(config.service.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_source_by_service_name() {
        let mut config = CorrectionConfig::default();
        config.service = "ntrip".to_string();
        assert!(create_source(&config).is_ok());
        config.service = "pp".to_string();
        assert!(create_source(&config).is_ok());
        config.service = "rtk2go".to_string();
        assert!(matches!(
            create_source(&config),
            Err(Error::UnknownService(_))
        ));
    }
}
