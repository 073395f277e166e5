//! u-blox GNSS rover driver
//!
//! Polls the receiver for UBX-NAV-PVT solutions and publishes each decoded
//! solution as a typed reading. The serial handle is shared with the
//! correction relay: the poll loop reads solutions while the relay pushes
//! correction bytes down the same port, serialized by a mutex. Critical
//! sections are bounded by the serial read timeout, so a correction write
//! never waits longer than one read slice.

pub mod protocol;

use crate::correction::CorrectionWriter;
use crate::error::{Error, Result};
use crate::reading::Reading;
use crate::stop::StopSignal;
use crate::telemetry::ReadingSink;
use crate::transport::Transport;
use parking_lot::Mutex;
use protocol::{FrameReader, NavPvt};
use std::time::{Duration, Instant};

/// Serial read timeout; also bounds how long a correction write can block
/// on the port mutex
pub const READ_TIMEOUT: Duration = Duration::from_millis(100);
/// How long one poll waits for its NAV-PVT response
const RESPONSE_DEADLINE: Duration = Duration::from_secs(1);
/// Pause between empty reads while a response is pending
const IDLE_PAUSE: Duration = Duration::from_millis(5);
/// Pause after a failed poll cycle before retrying
const RETRY_PAUSE: Duration = Duration::from_millis(500);

/// u-blox receiver behind a shared serial port
///
/// The port starts detached; [`GnssRover::open`] attaches it before the
/// reader thread starts and [`GnssRover::close`] releases it after every
/// task has joined.
pub struct GnssRover {
    transport: Mutex<Option<Box<dyn Transport>>>,
}

impl GnssRover {
    pub fn new() -> Self {
        Self {
            transport: Mutex::new(None),
        }
    }

    /// Attach the opened serial transport
    pub fn open(&self, transport: Box<dyn Transport>) {
        *self.transport.lock() = Some(transport);
    }

    pub fn is_open(&self) -> bool {
        self.transport.lock().is_some()
    }

    /// Release the serial handle
    pub fn close(&self) {
        if self.transport.lock().take().is_some() {
            log::info!("GNSS: serial port closed");
        }
    }

    /// Push correction bytes down to the receiver
    ///
    /// Corrections arriving while the port is not open are dropped with an
    /// error log; a late chunk never fails the relay.
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        let mut guard = self.transport.lock();
        match guard.as_mut() {
            Some(transport) => {
                transport.write_all(bytes)?;
                transport.flush()
            }
            None => {
                log::error!(
                    "GNSS: dropped {} correction bytes, the serial port is not open",
                    bytes.len()
                );
                Ok(())
            }
        }
    }

    fn read_some(&self, buf: &mut [u8]) -> Result<usize> {
        let mut guard = self.transport.lock();
        match guard.as_mut() {
            Some(transport) => transport.read(buf),
            None => Err(Error::PortNotOpen),
        }
    }

    /// Poll NAV-PVT until stopped, publishing every decoded solution
    ///
    /// Poll and read failures are logged and the cycle retries; only a
    /// missing port at startup ends the loop early.
    pub fn run(&self, sink: &mut dyn ReadingSink, stop: &StopSignal) -> Result<()> {
        if !self.is_open() {
            log::error!("GNSS: the serial port is not open");
            return Ok(());
        }

        log::info!("GNSS: reading");
        let poll = protocol::nav_pvt_poll();
        let mut frames = FrameReader::new();

        while !stop.is_set() {
            if let Err(e) = self.write(&poll) {
                log::error!("GNSS: poll failed: {}", e);
                stop.wait(RETRY_PAUSE);
                continue;
            }
            match self.await_solution(&mut frames, stop) {
                Ok(Some(reading)) => {
                    if let Err(e) = sink.publish(&reading) {
                        log::error!("GNSS: publish failed: {}", e);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    log::error!("GNSS: read failed: {}", e);
                    stop.wait(RETRY_PAUSE);
                }
            }
        }

        log::info!("GNSS: reading stopped");
        Ok(())
    }

    /// Read until a NAV-PVT frame decodes or the response deadline passes
    ///
    /// Other frame classes (ACKs, unsolicited output) are skipped.
    /// Corrupted frames are logged and the scan continues. A receiver
    /// that stays mute past the deadline is reported once per poll.
    fn await_solution(
        &self,
        frames: &mut FrameReader,
        stop: &StopSignal,
    ) -> Result<Option<Reading>> {
        let deadline = Instant::now() + RESPONSE_DEADLINE;
        let mut chunk = [0u8; 512];

        while Instant::now() < deadline {
            if stop.is_set() {
                return Ok(None);
            }

            let n = self.read_some(&mut chunk)?;
            if n == 0 {
                std::thread::sleep(IDLE_PAUSE);
                continue;
            }
            frames.extend(&chunk[..n]);

            loop {
                match frames.next_frame() {
                    Ok(Some(frame)) if frame.is_nav_pvt() => match NavPvt::decode(&frame.payload) {
                        Ok(pvt) => return Ok(Some(pvt.to_reading())),
                        Err(e) => log::warn!("GNSS: {}", e),
                    },
                    Ok(Some(frame)) => {
                        log::debug!(
                            "GNSS: skipping frame class {:#04x} id {:#04x}",
                            frame.class,
                            frame.id
                        );
                    }
                    Ok(None) => break,
                    Err(e) => log::warn!("GNSS: {}", e),
                }
            }
        }

        if !stop.is_set() {
            log::warn!(
                "GNSS: no NAV-PVT response within {} ms",
                RESPONSE_DEADLINE.as_millis()
            );
        }
        Ok(None)
    }
}

impl Default for GnssRover {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrectionWriter for GnssRover {
    fn write(&self, bytes: &[u8]) -> Result<()> {
        GnssRover::write(self, bytes)
    }
}
