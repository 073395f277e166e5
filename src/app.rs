//! Application orchestration for the rover I/O daemon
//!
//! Owns the device handles and the per-task stop signals, starts the
//! acquisition and relay threads, and drives graceful shutdown.

use crate::config::{AppConfig, GnssConfig};
use crate::correction::{create_source, CorrectionSource};
use crate::devices::{decawave, ublox, GnssRover, UwbTag};
use crate::error::Result;
use crate::imu::ImuProcess;
use crate::stop::StopSignal;
use crate::telemetry::MqttPublisher;
use crate::transport::{find_port, PortMatch, SerialTransport, Transport};
use log::{error, info};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Main-loop poll interval for the shutdown flag
const KEEPALIVE_POLL: Duration = Duration::from_millis(200);

/// Main application structure that manages all components
///
/// Each sensor task gets its own stop signal: the UWB session reuses its
/// signal internally to end the streaming stage, so stopping it must not
/// be entangled with the other tasks.
pub struct RoverApp {
    config: AppConfig,
    rover: Arc<GnssRover>,
    telemetry: MqttPublisher,
    imu: ImuProcess,
    correction: Option<Box<dyn CorrectionSource>>,
    stop_positioning: StopSignal,
    stop_ranging: StopSignal,
    stop_relay: StopSignal,
    shutdown: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,
}

impl RoverApp {
    /// Create a new application instance
    ///
    /// The receiver port is opened here, before any task starts, because
    /// the poll loop and the correction relay share it. A receiver that
    /// fails to open is logged and the rover runs degraded: the ranging
    /// and telemetry paths do not depend on it. An unknown correction
    /// service name is a hard configuration error and fails startup.
    pub fn new(config: AppConfig) -> Result<Self> {
        info!("Initializing rover I/O");

        let telemetry = MqttPublisher::connect(&config.telemetry)?;

        let rover = Arc::new(GnssRover::new());
        match Self::open_gnss_port(&config.gnss) {
            Ok(transport) => rover.open(transport),
            Err(e) => error!("GNSS: {}", e),
        }

        let imu = ImuProcess::new(config.imu.command.clone());
        let correction = create_source(&config.correction)?;

        info!("✓ Devices initialized");
        Ok(Self {
            config,
            rover,
            telemetry,
            imu,
            correction: Some(correction),
            stop_positioning: StopSignal::new(),
            stop_ranging: StopSignal::new(),
            stop_relay: StopSignal::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
            tasks: Vec::new(),
        })
    }

    fn open_gnss_port(config: &GnssConfig) -> Result<Box<dyn Transport>> {
        let port = find_port(PortMatch::Product(&config.product))?;
        info!("GNSS: using {}", port);
        let transport = SerialTransport::open(&port, config.baud_rate, ublox::READ_TIMEOUT)?;
        Ok(Box::new(transport))
    }

    /// Start all background tasks and run the main loop until a signal
    pub fn run(&mut self) -> Result<()> {
        info!("Starting acquisition tasks");

        self.setup_signal_handler();
        self.start_positioning_task()?;
        self.start_ranging_task()?;
        self.imu.start();
        self.start_relay_task()?;

        info!("✓ All tasks started");
        info!("Press Ctrl+C to stop");

        while !self.shutdown.load(Ordering::Relaxed) {
            thread::sleep(KEEPALIVE_POLL);
        }

        info!("Shutdown signal received, stopping tasks...");
        self.stop();
        Ok(())
    }

    /// GNSS poll loop on the shared receiver handle
    fn start_positioning_task(&mut self) -> Result<()> {
        let rover = Arc::clone(&self.rover);
        let mut sink = self.telemetry.sink();
        let stop = self.stop_positioning.clone();

        let handle = thread::Builder::new()
            .name("gnss-reader".to_string())
            .spawn(move || {
                if let Err(e) = rover.run(&mut sink, &stop) {
                    error!("GNSS: task failed: {}", e);
                }
            })?;
        self.tasks.push(handle);
        Ok(())
    }

    /// UWB shell session; the tag owns its port, so it is opened here
    /// inside the task
    fn start_ranging_task(&mut self) -> Result<()> {
        let config = self.config.uwb.clone();
        let mut sink = self.telemetry.sink();
        let stop = self.stop_ranging.clone();

        let handle = thread::Builder::new()
            .name("uwb-reader".to_string())
            .spawn(move || {
                let port = match find_port(PortMatch::Manufacturer(&config.manufacturer)) {
                    Ok(port) => port,
                    Err(e) => {
                        error!("UWB: {}", e);
                        return;
                    }
                };
                info!("UWB: using {}", port);
                let transport =
                    match SerialTransport::open(&port, config.baud_rate, decawave::READ_TIMEOUT) {
                        Ok(transport) => transport,
                        Err(e) => {
                            error!("UWB: opening {} failed: {}", port, e);
                            return;
                        }
                    };
                let tag = UwbTag::new(Box::new(transport))
                    .with_rejoin_backoff(Duration::from_secs(config.rejoin_backoff_secs));
                if let Err(e) = tag.run(&mut sink, &stop) {
                    error!("UWB: task failed: {}", e);
                }
            })?;
        self.tasks.push(handle);
        Ok(())
    }

    /// Correction stream into the shared receiver handle
    fn start_relay_task(&mut self) -> Result<()> {
        let Some(mut source) = self.correction.take() else {
            return Ok(());
        };
        let writer = Arc::clone(&self.rover);
        let stop = self.stop_relay.clone();

        let handle = thread::Builder::new()
            .name("correction-relay".to_string())
            .spawn(move || {
                if let Err(e) = source.run(writer.as_ref(), &stop) {
                    error!("Correction: task failed: {}", e);
                }
            })?;
        self.tasks.push(handle);
        Ok(())
    }

    /// Setup signal handler for graceful shutdown
    fn setup_signal_handler(&self) {
        let shutdown = Arc::clone(&self.shutdown);

        thread::Builder::new()
            .name("signal-handler".to_string())
            .spawn(move || {
                let mut signals =
                    Signals::new([SIGINT, SIGTERM]).expect("Failed to register signal handlers");

                if let Some(sig) = signals.forever().next() {
                    info!("Received signal {:?}, initiating shutdown...", sig);
                    shutdown.store(true, Ordering::Relaxed);
                }
            })
            .expect("Failed to spawn signal handler thread");
    }

    /// Stop every task and release the devices
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.stop_positioning.set();
        self.stop_ranging.set();
        self.stop_relay.set();

        self.imu.stop();

        for handle in self.tasks.drain(..) {
            let name = handle.thread().name().unwrap_or("task").to_string();
            if handle.join().is_err() {
                error!("Task {} panicked", name);
            }
        }

        // The receiver handle is shared; release it only after every
        // task that could touch it has joined
        self.rover.close();
        self.telemetry.shutdown();
        info!("✓ All tasks stopped");
    }
}

impl Drop for RoverApp {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if !self.tasks.is_empty() {
            self.stop();
        }
    }
}
