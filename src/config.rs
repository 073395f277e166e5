//! Configuration for the rover I/O daemon
//!
//! Loads configuration from a TOML file. Every key has a default matching
//! the rover's standard wiring, so a partial file (or none at all) yields
//! a usable configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub telemetry: TelemetryConfig,
    pub gnss: GnssConfig,
    pub uwb: UwbConfig,
    pub imu: ImuConfig,
    pub correction: CorrectionConfig,
}

/// Telemetry broker configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    /// Topic for positioning readings
    pub gnss_topic: String,
    /// Topic for ranging readings
    pub uwb_topic: String,
}

/// GNSS receiver configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GnssConfig {
    /// USB product string the receiver enumerates with
    pub product: String,
    pub baud_rate: u32,
}

/// UWB tag configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UwbConfig {
    /// USB manufacturer string of the tag's debug bridge
    pub manufacturer: String,
    pub baud_rate: u32,
    /// Idle period between read attempts while the anchor network is away
    pub rejoin_backoff_secs: u64,
}

/// External IMU pipeline configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ImuConfig {
    /// Command line of the pipeline program; unset disables the unit
    pub command: Option<String>,
}

/// Correction relay configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Which upstream feeds the receiver: "ntrip" or "pp"
    pub service: String,
    pub ntrip: NtripConfig,
    pub pp: PointPerfectConfig,
}

/// NTRIP caster access
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NtripConfig {
    pub host: String,
    pub port: u16,
    /// Full Authorization header value, e.g. `Basic <base64>`
    pub auth: String,
    pub mountpoint: String,
}

/// PointPerfect service access
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PointPerfectConfig {
    pub host: String,
    pub port: u16,
    /// Device identity the credentials were issued for
    pub client_id: String,
    /// Regional correction topic
    pub topic: String,
    /// Directory holding the device certificate, key and service CA
    pub cert_dir: String,
}

impl AppConfig {
    /// Load configuration from a TOML file
    ///
    /// # Example
    /// ```no_run
    /// use rover_io::config::AppConfig;
    ///
    /// let config = AppConfig::from_file("/etc/rover-io/config.toml")?;
    /// # Ok::<(), rover_io::Error>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {}", path.display(), e)))?;
        let config: AppConfig = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("parsing {}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        fs::write(path, contents)?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            telemetry: TelemetryConfig::default(),
            gnss: GnssConfig::default(),
            uwb: UwbConfig::default(),
            imu: ImuConfig::default(),
            correction: CorrectionConfig::default(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "rover-io".to_string(),
            gnss_topic: "sensorfusion/gps".to_string(),
            uwb_topic: "sensorfusion/uwb".to_string(),
        }
    }
}

impl Default for GnssConfig {
    fn default() -> Self {
        Self {
            product: "u-blox GNSS receiver".to_string(),
            baud_rate: 115200,
        }
    }
}

impl Default for UwbConfig {
    fn default() -> Self {
        Self {
            manufacturer: "SEGGER".to_string(),
            baud_rate: 115200,
            rejoin_backoff_secs: 10,
        }
    }
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            service: "pp".to_string(),
            ntrip: NtripConfig::default(),
            pp: PointPerfectConfig::default(),
        }
    }
}

impl Default for NtripConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 2101,
            auth: String::new(),
            mountpoint: "SeAMK".to_string(),
        }
    }
}

impl Default for PointPerfectConfig {
    fn default() -> Self {
        Self {
            host: "pp.services.u-blox.com".to_string(),
            port: 8883,
            client_id: String::new(),
            topic: "/pp/ip/eu".to_string(),
            cert_dir: "cert".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.telemetry.host, "localhost");
        assert_eq!(config.telemetry.port, 1883);
        assert_eq!(config.telemetry.gnss_topic, "sensorfusion/gps");
        assert_eq!(config.telemetry.uwb_topic, "sensorfusion/uwb");
        assert_eq!(config.gnss.product, "u-blox GNSS receiver");
        assert_eq!(config.uwb.manufacturer, "SEGGER");
        assert_eq!(config.uwb.rejoin_backoff_secs, 10);
        assert!(config.imu.command.is_none());
        assert_eq!(config.correction.service, "pp");
        assert_eq!(config.correction.ntrip.port, 2101);
        assert_eq!(config.correction.pp.host, "pp.services.u-blox.com");
        assert_eq!(config.correction.pp.topic, "/pp/ip/eu");
    }

    #[test]
    fn test_toml_round_trip() {
        let config = AppConfig::default();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[telemetry]"));
        assert!(toml_string.contains("[gnss]"));
        assert!(toml_string.contains("[uwb]"));
        assert!(toml_string.contains("[correction]"));
        assert!(toml_string.contains("[correction.ntrip]"));
        assert!(toml_string.contains("[correction.pp]"));

        let parsed: AppConfig = toml::from_str(&toml_string).unwrap();
        assert_eq!(parsed.telemetry.client_id, "rover-io");
        assert_eq!(parsed.correction.pp.cert_dir, "cert");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let toml_content = r#"
[correction]
service = "ntrip"

[correction.ntrip]
host = "caster.example.net"
auth = "Basic dXNlcjpwYXNz"

[uwb]
rejoin_backoff_secs = 3
"#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.correction.service, "ntrip");
        assert_eq!(config.correction.ntrip.host, "caster.example.net");
        // Unset keys and whole sections come from the defaults
        assert_eq!(config.correction.ntrip.port, 2101);
        assert_eq!(config.correction.ntrip.mountpoint, "SeAMK");
        assert_eq!(config.uwb.rejoin_backoff_secs, 3);
        assert_eq!(config.uwb.manufacturer, "SEGGER");
        assert_eq!(config.telemetry.host, "localhost");
    }

    #[test]
    fn test_missing_file_is_a_config_error() {
        assert!(matches!(
            AppConfig::from_file("/nonexistent/rover-io.toml"),
            Err(Error::Config(_))
        ));
    }
}
