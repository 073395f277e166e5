//! MQTT publisher for normalized readings

use super::ReadingSink;
use crate::config::TelemetryConfig;
use crate::error::Result;
use crate::reading::{Reading, Source};
use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Bound on one event-queue service call so shutdown stays responsive
const EVENT_POLL: Duration = Duration::from_millis(250);
/// Pause between reconnect attempts when the broker is unreachable
const RECONNECT_PAUSE: Duration = Duration::from_secs(1);
/// Outgoing request queue depth; overflow drops readings instead of blocking
const QUEUE_CAPACITY: usize = 64;

/// Owns the broker session for the whole process and the thread that
/// services its event queue. Readers publish through cloneable
/// [`MqttSink`] handles.
///
/// The session connects lazily and reconnects on failure; sensor loops are
/// never coupled to broker availability.
pub struct MqttPublisher {
    client: Client,
    gnss_topic: String,
    uwb_topic: String,
    shutdown: Arc<AtomicBool>,
    event_thread: Option<JoinHandle<()>>,
}

impl MqttPublisher {
    /// Create the broker session and start the event-service thread
    pub fn connect(config: &TelemetryConfig) -> Result<MqttPublisher> {
        let mut options = MqttOptions::new(
            config.client_id.as_str(),
            config.host.as_str(),
            config.port,
        );
        options.set_keep_alive(Duration::from_secs(30));
        let (client, connection) = Client::new(options, QUEUE_CAPACITY);

        let shutdown = Arc::new(AtomicBool::new(false));
        let thread_shutdown = Arc::clone(&shutdown);
        let event_thread = std::thread::Builder::new()
            .name("mqtt-events".to_string())
            .spawn(move || event_loop(connection, thread_shutdown))?;

        log::info!("Telemetry: publishing to {}:{}", config.host, config.port);
        Ok(MqttPublisher {
            client,
            gnss_topic: config.gnss_topic.clone(),
            uwb_topic: config.uwb_topic.clone(),
            shutdown,
            event_thread: Some(event_thread),
        })
    }

    /// Sink handle for a reader thread
    pub fn sink(&self) -> MqttSink {
        MqttSink {
            client: self.client.clone(),
            gnss_topic: self.gnss_topic.clone(),
            uwb_topic: self.uwb_topic.clone(),
        }
    }

    /// Disconnect from the broker and join the event thread
    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        let _ = self.client.try_disconnect();
        if let Some(handle) = self.event_thread.take() {
            let _ = handle.join();
        }
        log::info!("Telemetry: stopped");
    }
}

impl Drop for MqttPublisher {
    fn drop(&mut self) {
        if self.event_thread.is_some() {
            self.shutdown();
        }
    }
}

fn event_loop(mut connection: Connection, shutdown: Arc<AtomicBool>) {
    while !shutdown.load(Ordering::Relaxed) {
        match connection.recv_timeout(EVENT_POLL) {
            Ok(Ok(Event::Incoming(Packet::ConnAck(_)))) => {
                log::info!("Telemetry: connected to broker");
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                log::warn!("Telemetry: connection error: {}", e);
                std::thread::sleep(RECONNECT_PAUSE);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Per-reader publish handle mapping a reading's source to its topic
#[derive(Clone)]
pub struct MqttSink {
    client: Client,
    gnss_topic: String,
    uwb_topic: String,
}

impl MqttSink {
    fn topic_for(&self, source: Source) -> &str {
        match source {
            Source::Positioning => &self.gnss_topic,
            Source::Ranging => &self.uwb_topic,
        }
    }
}

impl ReadingSink for MqttSink {
    fn publish(&mut self, reading: &Reading) -> Result<()> {
        let payload = reading.to_json()?;
        let topic = self.topic_for(reading.source());
        // Readings are fire-and-forget; when the request queue is full
        // (broker down) drop the reading rather than stall the sensor loop.
        if let Err(e) = self
            .client
            .try_publish(topic, QoS::AtMostOnce, false, payload)
        {
            log::trace!("Telemetry: dropped reading: {}", e);
        }
        Ok(())
    }
}
