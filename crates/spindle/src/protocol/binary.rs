//! Strict binary message codec.
//!
//! Layout, all integers big-endian:
//!
//! ```text
//! u32  version | kind      (0x8001_00KK)
//! u32  name length, then that many UTF-8 bytes
//! i32  sequence id
//! u32  payload length, then that many bytes
//! ```

use spindle_config::DEFAULT_MAX_FRAME_BYTES;

use super::{Message, MessageKind, Protocol, ProtocolFactory};
use crate::error::{ProtocolError, TransportError};
use crate::transport::Transport;

const VERSION_1: u32 = 0x8001_0000;
const VERSION_MASK: u32 = 0xffff_0000;
const KIND_MASK: u32 = 0x0000_00ff;

/// [`Protocol`] using the strict binary layout.
pub struct BinaryProtocol {
    transport: Box<dyn Transport>,
    max_frame_bytes: usize,
}

impl BinaryProtocol {
    /// Wraps `transport`, refusing names or payloads over `max_frame_bytes`.
    #[must_use]
    pub fn new(transport: Box<dyn Transport>, max_frame_bytes: usize) -> Self {
        Self {
            transport,
            max_frame_bytes,
        }
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        let mut filled = 0;
        while let Some(rest) = buf.get_mut(filled..).filter(|rest| !rest.is_empty()) {
            match self.transport.read(rest)? {
                0 => return Err(TransportError::EndOfFile),
                read => filled += read,
            }
        }
        Ok(())
    }

    fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        let mut bytes = [0_u8; 4];
        self.read_exact(&mut bytes)?;
        Ok(u32::from_be_bytes(bytes))
    }

    fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        let mut bytes = [0_u8; 4];
        self.read_exact(&mut bytes)?;
        Ok(i32::from_be_bytes(bytes))
    }

    fn read_sized(&mut self, what: &'static str) -> Result<Vec<u8>, ProtocolError> {
        let size = usize::try_from(self.read_u32()?).unwrap_or(usize::MAX);
        self.check_size(what, size)?;
        let mut bytes = vec![0_u8; size];
        self.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    fn write_sized(&mut self, what: &'static str, bytes: &[u8]) -> Result<(), ProtocolError> {
        self.check_size(what, bytes.len())?;
        let size = u32::try_from(bytes.len()).map_err(|_| ProtocolError::SizeLimit {
            what,
            size: bytes.len(),
            limit: self.max_frame_bytes,
        })?;
        self.transport.write(&size.to_be_bytes())?;
        self.transport.write(bytes)?;
        Ok(())
    }

    fn check_size(&self, what: &'static str, size: usize) -> Result<(), ProtocolError> {
        if size > self.max_frame_bytes {
            return Err(ProtocolError::SizeLimit {
                what,
                size,
                limit: self.max_frame_bytes,
            });
        }
        Ok(())
    }
}

impl Protocol for BinaryProtocol {
    fn read_message(&mut self) -> Result<Message, ProtocolError> {
        let header = self.read_u32()?;
        if header & VERSION_MASK != VERSION_1 {
            return Err(ProtocolError::BadVersion { found: header });
        }
        let kind = MessageKind::try_from(u8::try_from(header & KIND_MASK).unwrap_or(u8::MAX))?;
        let name = String::from_utf8(self.read_sized("message name")?)
            .map_err(ProtocolError::InvalidName)?;
        let sequence = self.read_i32()?;
        let payload = self.read_sized("payload")?;
        Ok(Message {
            name,
            kind,
            sequence,
            payload,
        })
    }

    fn write_message(&mut self, message: &Message) -> Result<(), ProtocolError> {
        let header = VERSION_1 | u32::from(message.kind.code());
        self.transport.write(&header.to_be_bytes())?;
        self.write_sized("message name", message.name.as_bytes())?;
        self.transport.write(&message.sequence.to_be_bytes())?;
        self.write_sized("payload", &message.payload)?;
        self.transport.flush()?;
        Ok(())
    }

    fn transport(&mut self) -> &mut dyn Transport {
        self.transport.as_mut()
    }
}

/// Builds [`BinaryProtocol`]s with a shared frame limit.
#[derive(Debug, Clone, Copy)]
pub struct BinaryProtocolFactory {
    max_frame_bytes: usize,
}

impl BinaryProtocolFactory {
    #[must_use]
    pub fn new(max_frame_bytes: usize) -> Self {
        Self { max_frame_bytes }
    }

    /// Frame limit applied to every protocol this factory builds.
    #[must_use]
    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }
}

impl Default for BinaryProtocolFactory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl ProtocolFactory for BinaryProtocolFactory {
    fn protocol(&self, transport: Box<dyn Transport>) -> Box<dyn Protocol> {
        Box::new(BinaryProtocol::new(transport, self.max_frame_bytes))
    }
}
