//! NTRIP caster client
//!
//! Speaks just enough of the protocol to open a mountpoint stream: one
//! HTTP/1.0-style request, then the caster's raw byte stream until it
//! closes the connection. The stream is relayed as received, response
//! header included; the receiver skips what it cannot frame.

use super::{CorrectionSource, CorrectionWriter};
use crate::config::NtripConfig;
use crate::error::{Error, Result};
use crate::stop::StopSignal;
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Read buffer size; one relay write per received chunk
const CHUNK_SIZE: usize = 4096;
/// Socket read timeout between stop checks
const READ_TIMEOUT: Duration = Duration::from_millis(500);
/// Caster connect timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Agent string the caster operator expects in access logs
const USER_AGENT: &str = "NTRIP RaspberryPi/3";

pub struct NtripClient {
    config: NtripConfig,
}

impl NtripClient {
    pub fn new(config: NtripConfig) -> Self {
        Self { config }
    }

    /// Mountpoint request
    ///
    /// Casters start streaming on the bare three-header form; no blank
    /// line terminator is sent.
    fn mountpoint_request(&self) -> String {
        format!(
            "GET /{} HTTP/1.0\r\nUser-Agent: {}\r\nAuthorization: {}\r\n",
            self.config.mountpoint, USER_AGENT, self.config.auth
        )
    }

    fn connect(&self) -> Result<TcpStream> {
        let address = format!("{}:{}", self.config.host, self.config.port);
        let mut addrs = address.to_socket_addrs()?;
        let Some(addr) = addrs.next() else {
            return Err(Error::ConnectionRejected(format!(
                "{} did not resolve",
                address
            )));
        };
        let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)?;
        stream.set_read_timeout(Some(READ_TIMEOUT))?;
        Ok(stream)
    }
}

impl CorrectionSource for NtripClient {
    fn run(&mut self, writer: &dyn CorrectionWriter, stop: &StopSignal) -> Result<()> {
        log::info!(
            "NTRIP: connecting to {}:{} /{}",
            self.config.host,
            self.config.port,
            self.config.mountpoint
        );
        let mut stream = match self.connect() {
            Ok(stream) => stream,
            Err(e) => {
                log::error!("NTRIP: connect failed: {}", e);
                return Err(e);
            }
        };
        stream.write_all(self.mountpoint_request().as_bytes())?;

        log::info!("NTRIP: reading");
        let mut chunk = [0u8; CHUNK_SIZE];
        loop {
            if stop.is_set() {
                log::info!("NTRIP: stopping");
                break;
            }
            match stream.read(&mut chunk) {
                Ok(0) => {
                    log::info!("NTRIP: stream ended");
                    break;
                }
                Ok(n) => writer.write(&chunk[..n])?,
                Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {}
                Err(e) => {
                    log::error!("NTRIP: read failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        log::info!("NTRIP: reading stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mountpoint_request_format() {
        let client = NtripClient::new(NtripConfig {
            host: "caster.example.net".to_string(),
            port: 2101,
            auth: "Basic dXNlcjpwYXNz".to_string(),
            mountpoint: "SeAMK".to_string(),
        });
        assert_eq!(
            client.mountpoint_request(),
            "GET /SeAMK HTTP/1.0\r\n\
             User-Agent: NTRIP RaspberryPi/3\r\n\
             Authorization: Basic dXNlcjpwYXNz\r\n"
        );
    }
}
