//! Decawave DWM1001 ranging tag driver
//!
//! The tag is driven through its UART shell. A session walks four stages:
//!
//! 1. wake the shell and drain the banner
//! 2. toggle ranging on and stream updates until told to stop
//! 3. toggle ranging off and drain the tail
//! 4. leave the shell and drain the prompt
//!
//! Only stage 2 publishes readings. Because `les` is a toggle, the off and
//! quit commands must be sent even on shutdown, so the stop signal ends
//! stage 2 rather than the whole session. While the anchor network is out
//! of reach the shell goes quiet; stage 2 then idles between read attempts
//! instead of giving up.

pub mod protocol;

use crate::error::Result;
use crate::stop::StopSignal;
use crate::telemetry::ReadingSink;
use crate::transport::Transport;
use protocol::{PositionEstimate, ENTER_SHELL, EXIT_SHELL, MAX_LINE_LEN, TOGGLE_RANGING};
use std::time::Duration;

/// Serial read timeout; one quiet period of this length ends a drain
pub const READ_TIMEOUT: Duration = Duration::from_secs(1);
/// Pause after each command so the shell can switch modes
const SETTLE_PAUSE: Duration = Duration::from_millis(100);
/// Default idle period between read attempts while the network is away
pub const REJOIN_BACKOFF: Duration = Duration::from_secs(10);

/// What one drain pass does with the lines it reads
#[derive(Clone, Copy, Debug, Default)]
struct DrainOptions {
    /// Publish a reading for every line
    send_data: bool,
    /// Keep waiting through quiet periods instead of ending the drain
    wait_network: bool,
}

/// DWM1001 tag behind its shell UART
pub struct UwbTag {
    transport: Box<dyn Transport>,
    estimate: PositionEstimate,
    rejoin_backoff: Duration,
}

impl UwbTag {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            estimate: PositionEstimate::default(),
            rejoin_backoff: REJOIN_BACKOFF,
        }
    }

    /// Override the quiet-network idle period
    pub fn with_rejoin_backoff(mut self, backoff: Duration) -> Self {
        self.rejoin_backoff = backoff;
        self
    }

    /// Drive one full shell session, blocking until stopped
    ///
    /// Consumes the tag; dropping it on return releases the serial handle
    /// with the module back out of shell mode.
    pub fn run(mut self, sink: &mut dyn ReadingSink, stop: &StopSignal) -> Result<()> {
        self.command(ENTER_SHELL)?;
        self.drain(sink, stop, DrainOptions::default())?;

        log::info!("UWB: reading");
        self.command(TOGGLE_RANGING)?;
        self.drain(
            sink,
            stop,
            DrainOptions {
                send_data: true,
                wait_network: true,
            },
        )?;

        // The remaining stages must still run to leave the module idle
        stop.clear();
        self.command(TOGGLE_RANGING)?;
        self.drain(sink, stop, DrainOptions::default())?;

        self.command(EXIT_SHELL)?;
        self.drain(sink, stop, DrainOptions::default())?;

        log::info!("UWB: reading stopped");
        Ok(())
    }

    fn command(&mut self, bytes: &[u8]) -> Result<()> {
        self.transport.write_all(bytes)?;
        self.transport.flush()
    }

    /// Consume shell output line by line until quiet or stopped
    fn drain(
        &mut self,
        sink: &mut dyn ReadingSink,
        stop: &StopSignal,
        options: DrainOptions,
    ) -> Result<()> {
        std::thread::sleep(SETTLE_PAUSE);

        loop {
            if stop.is_set() {
                log::info!("UWB: stopping");
                break;
            }

            let line = self.read_line()?;
            if line.is_empty() {
                if options.wait_network {
                    log::debug!("UWB: no updates, waiting for the anchor network");
                    stop.wait(self.rejoin_backoff);
                    continue;
                }
                break;
            }

            let text = String::from_utf8_lossy(&line);
            let text = text.trim_end_matches(['\r', '\n']);
            log::trace!("UWB: {}", text);
            if !options.send_data {
                continue;
            }

            // Every update line is published. Lines without a position
            // solution republish the last estimate with the fix lowered.
            let fix_ok = self.estimate.update_from_line(text);
            if let Err(e) = sink.publish(&self.estimate.to_reading(fix_ok)) {
                log::error!("UWB: publish failed: {}", e);
            }
        }
        Ok(())
    }

    /// Read one line, ending at newline, the length cap, or a quiet period
    ///
    /// An empty return means nothing arrived within the read timeout.
    fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::with_capacity(64);
        let mut byte = [0u8; 1];
        loop {
            let n = self.transport.read(&mut byte)?;
            if n == 0 {
                break;
            }
            line.push(byte[0]);
            if byte[0] == b'\n' || line.len() >= MAX_LINE_LEN {
                break;
            }
        }
        Ok(line)
    }
}
