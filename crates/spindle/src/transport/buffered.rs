//! Buffered wrapper transport.

use super::{Transport, TransportFactory};
use crate::error::TransportError;

const DEFAULT_CAPACITY: usize = 8 * 1024;

/// Adds read and write buffering to another transport.
///
/// Writes accumulate until [`Transport::flush`] or until the buffer fills.
/// [`Transport::peek`] reports buffered input before consulting the inner
/// transport.
pub struct BufferedTransport {
    inner: Box<dyn Transport>,
    capacity: usize,
    read_buf: Vec<u8>,
    read_pos: usize,
    write_buf: Vec<u8>,
}

impl BufferedTransport {
    /// Wraps `inner` with buffers of `capacity` bytes.
    #[must_use]
    pub fn new(inner: Box<dyn Transport>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner,
            capacity,
            read_buf: Vec::with_capacity(capacity),
            read_pos: 0,
            write_buf: Vec::with_capacity(capacity),
        }
    }

    fn buffered_input(&self) -> &[u8] {
        self.read_buf.get(self.read_pos..).unwrap_or_default()
    }

    fn fill(&mut self) -> Result<usize, TransportError> {
        self.read_buf.resize(self.capacity, 0);
        self.read_pos = 0;
        match self.inner.read(&mut self.read_buf) {
            Ok(read) => {
                self.read_buf.truncate(read);
                Ok(read)
            }
            Err(error) => {
                self.read_buf.clear();
                Err(error)
            }
        }
    }
}

impl Transport for BufferedTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.buffered_input().is_empty() {
            // Large reads skip the buffer entirely.
            if buf.len() >= self.capacity {
                return self.inner.read(buf);
            }
            if self.fill()? == 0 {
                return Ok(0);
            }
        }
        let available = self.buffered_input();
        let count = available.len().min(buf.len());
        let (target, _) = buf.split_at_mut(count);
        let (source, _) = available.split_at(count);
        target.copy_from_slice(source);
        self.read_pos += count;
        Ok(count)
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        if self.write_buf.len() + buf.len() > self.capacity {
            self.flush()?;
        }
        if buf.len() >= self.capacity {
            return self.inner.write(buf);
        }
        self.write_buf.extend_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        if !self.write_buf.is_empty() {
            // Clear first so a failed write does not resend stale bytes.
            let pending = std::mem::take(&mut self.write_buf);
            self.inner.write(&pending)?;
        }
        self.inner.flush()
    }

    fn peek(&mut self) -> Result<bool, TransportError> {
        if !self.buffered_input().is_empty() {
            return Ok(true);
        }
        self.inner.peek()
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.read_buf.clear();
        self.read_pos = 0;
        self.write_buf.clear();
        self.inner.close()
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    fn try_clone(&self) -> Result<Box<dyn Transport>, TransportError> {
        Ok(Box::new(Self::new(self.inner.try_clone()?, self.capacity)))
    }
}

/// Wraps accepted connections in a [`BufferedTransport`].
#[derive(Debug, Clone, Copy)]
pub struct BufferedTransportFactory {
    capacity: usize,
}

impl BufferedTransportFactory {
    /// Factory producing buffers of `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity }
    }
}

impl Default for BufferedTransportFactory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl TransportFactory for BufferedTransportFactory {
    fn transport(&self, client: &dyn Transport) -> Result<Box<dyn Transport>, TransportError> {
        Ok(Box::new(BufferedTransport::new(
            client.try_clone()?,
            self.capacity,
        )))
    }
}
