//! In-memory transport for protocol tests

use super::Transport;
use crate::error::Result;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Transport double: reads come from an injected buffer, writes are
/// captured for inspection. Clones share the same buffers, so a test can
/// keep a handle while the driver under test owns another.
///
/// An empty read buffer reads as `Ok(0)`, which is exactly the timed-out
/// read of a quiet serial port.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    read_buffer: VecDeque<u8>,
    written: Vec<u8>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes to be returned by subsequent reads
    pub fn inject_read(&self, data: &[u8]) {
        self.inner.lock().read_buffer.extend(data);
    }

    /// All bytes written so far, in write order
    pub fn written(&self) -> Vec<u8> {
        self.inner.lock().written.clone()
    }

    pub fn clear_written(&self) {
        self.inner.lock().written.clear();
    }

    /// Bytes still queued for reading
    pub fn pending_read(&self) -> usize {
        self.inner.lock().read_buffer.len()
    }
}

impl Transport for MockTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let mut inner = self.inner.lock();
        let mut count = 0;
        while count < buffer.len() {
            match inner.read_buffer.pop_front() {
                Some(byte) => {
                    buffer[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.inner.lock().written.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_drains_injected_bytes() {
        let mock = MockTransport::new();
        mock.inject_read(b"hello");

        let mut transport = mock.clone();
        let mut buf = [0u8; 3];
        assert_eq!(transport.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"hel");
        assert_eq!(transport.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"lo");
        assert_eq!(transport.read(&mut buf).unwrap(), 0);
        assert_eq!(mock.pending_read(), 0);
    }

    #[test]
    fn test_writes_are_captured_in_order() {
        let mock = MockTransport::new();
        let mut transport = mock.clone();
        transport.write_all(b"one").unwrap();
        transport.write_all(b"two").unwrap();
        assert_eq!(mock.written(), b"onetwo");
        mock.clear_written();
        assert!(mock.written().is_empty());
    }
}
