//! PointPerfect SPARTN stream
//!
//! u-blox's correction service delivers SPARTN frames as MQTT publishes
//! on a regional topic. Access is mutual TLS with per-device credentials
//! issued by the service portal and stored alongside the service CA.

use super::{CorrectionSource, CorrectionWriter};
use crate::config::PointPerfectConfig;
use crate::error::{Error, Result};
use crate::stop::StopSignal;
use rumqttc::{Client, Connection, ConnectReturnCode, Event, MqttOptions, Packet, QoS, RecvTimeoutError};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Bound on one event-queue service call so stop checks stay frequent
const EVENT_POLL: Duration = Duration::from_millis(250);

pub struct PointPerfectClient {
    config: PointPerfectConfig,
}

impl PointPerfectClient {
    pub fn new(config: PointPerfectConfig) -> Self {
        Self { config }
    }

    /// Device certificate: `<dir>/device-<id>-pp-cert.crt`
    fn cert_path(&self) -> PathBuf {
        Path::new(&self.config.cert_dir)
            .join(format!("device-{}-pp-cert.crt", self.config.client_id))
    }

    /// Device key: `<dir>/device-<id>-pp-key.pem`
    fn key_path(&self) -> PathBuf {
        Path::new(&self.config.cert_dir).join(format!("device-{}-pp-key.pem", self.config.client_id))
    }

    /// Service CA: `<dir>/root-ca.crt`
    fn ca_path(&self) -> PathBuf {
        Path::new(&self.config.cert_dir).join("root-ca.crt")
    }

    fn tls_config(&self) -> Result<rumqttc::TlsConfiguration> {
        let ca = std::fs::read(self.ca_path())?;
        let cert = std::fs::read(self.cert_path())?;
        let key = std::fs::read(self.key_path())?;
        Ok(rumqttc::TlsConfiguration::Simple {
            ca,
            alpn: None,
            client_auth: Some((cert, key)),
        })
    }

    fn service_events(
        &self,
        client: &Client,
        connection: &mut Connection,
        writer: &dyn CorrectionWriter,
        stop: &StopSignal,
    ) -> Result<()> {
        loop {
            if stop.is_set() {
                log::info!("PointPerfect: stopping");
                return Ok(());
            }
            match connection.recv_timeout(EVENT_POLL) {
                Ok(Ok(event)) => match handle_event(event, writer)? {
                    EventOutcome::Subscribe => {
                        log::info!(
                            "PointPerfect: connected, subscribing to {}",
                            self.config.topic
                        );
                        client.subscribe(self.config.topic.as_str(), QoS::AtMostOnce)?;
                    }
                    EventOutcome::Continue => {}
                },
                Ok(Err(e)) => {
                    log::error!("PointPerfect: connection error: {}", e);
                    return Err(e.into());
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::ConnectionLost("event queue closed".to_string()));
                }
            }
        }
    }
}

/// What the session loop should do after one serviced event
#[derive(Debug, PartialEq, Eq)]
enum EventOutcome {
    Continue,
    Subscribe,
}

/// Dispatch one broker event
///
/// Each publish forwards its payload to the writer exactly once, in
/// arrival order. A rejected connection acknowledgment or a broker
/// disconnect ends the session as an error; everything else is
/// session bookkeeping.
fn handle_event(event: Event, writer: &dyn CorrectionWriter) -> Result<EventOutcome> {
    match event {
        Event::Incoming(Packet::ConnAck(ack)) => {
            if ack.code == ConnectReturnCode::Success {
                Ok(EventOutcome::Subscribe)
            } else {
                Err(Error::ConnectionRejected(format!(
                    "broker returned {:?}",
                    ack.code
                )))
            }
        }
        Event::Incoming(Packet::Publish(publish)) => {
            writer.write(&publish.payload)?;
            Ok(EventOutcome::Continue)
        }
        Event::Incoming(Packet::Disconnect) => {
            Err(Error::ConnectionLost("broker disconnected".to_string()))
        }
        _ => Ok(EventOutcome::Continue),
    }
}

impl CorrectionSource for PointPerfectClient {
    fn run(&mut self, writer: &dyn CorrectionWriter, stop: &StopSignal) -> Result<()> {
        let tls = match self.tls_config() {
            Ok(tls) => tls,
            Err(e) => {
                log::error!("PointPerfect: loading device credentials failed: {}", e);
                return Err(e);
            }
        };

        log::info!(
            "PointPerfect: connecting to {}:{}",
            self.config.host,
            self.config.port
        );
        let mut options = MqttOptions::new(
            self.config.client_id.as_str(),
            self.config.host.as_str(),
            self.config.port,
        );
        options.set_transport(rumqttc::Transport::Tls(tls));
        options.set_keep_alive(Duration::from_secs(30));
        let (client, mut connection) = Client::new(options, 10);

        let result = self.service_events(&client, &mut connection, writer, stop);

        let _ = client.try_unsubscribe(self.config.topic.as_str());
        let _ = client.try_disconnect();
        log::info!("PointPerfect: reading stopped");
        result
    }
}
