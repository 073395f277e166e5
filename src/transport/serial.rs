//! Serial transport and USB port discovery

use super::Transport;
use crate::error::{Error, Result};
use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use std::io::{Read, Write};
use std::time::Duration;

/// Descriptor used to locate a device among the enumerated serial ports
#[derive(Clone, Copy, Debug)]
pub enum PortMatch<'a> {
    /// USB product string, e.g. "u-blox GNSS receiver"
    Product(&'a str),
    /// USB manufacturer string, e.g. "SEGGER" (the debug bridge on the
    /// DWM1001 development board)
    Manufacturer(&'a str),
}

impl PortMatch<'_> {
    fn describes(&self, usb: &serialport::UsbPortInfo) -> bool {
        match *self {
            PortMatch::Product(s) => usb.product.as_deref() == Some(s),
            PortMatch::Manufacturer(s) => usb.manufacturer.as_deref() == Some(s),
        }
    }

    fn pattern(&self) -> &str {
        match *self {
            PortMatch::Product(s) | PortMatch::Manufacturer(s) => s,
        }
    }
}

/// Find the device path of the first enumerated USB serial port matching
/// the descriptor.
pub fn find_port(matcher: PortMatch<'_>) -> Result<String> {
    for port in serialport::available_ports()? {
        if let SerialPortType::UsbPort(ref usb) = port.port_type {
            if matcher.describes(usb) {
                return Ok(port.port_name);
            }
        }
    }
    Err(Error::PortNotFound(matcher.pattern().to_string()))
}

/// Serial transport for UART communication
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open a serial port at 8N1 with no flow control.
    ///
    /// # Arguments
    /// * `path` - Serial port path (e.g., "/dev/ttyACM0")
    /// * `baud_rate` - Baud rate (e.g., 115200)
    /// * `timeout` - Read timeout; bounds the stop-signal latency of the
    ///   loop that owns this port
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()?;

        log::info!("Opened serial port: {} at {} baud", path, baud_rate);

        Ok(SerialTransport { port })
    }
}

impl Transport for SerialTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        match self.port.read(buffer) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        Ok(self.port.write(data)?)
    }

    fn flush(&mut self) -> Result<()> {
        self.port.flush()?;
        Ok(())
    }
}
