//! Structured message encoding on top of a [`Transport`].

mod binary;

use crate::error::ProtocolError;
use crate::transport::Transport;

pub use self::binary::{BinaryProtocol, BinaryProtocolFactory};

/// Role of a message in an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Request expecting a reply.
    Call,
    /// Successful response to a call.
    Reply,
    /// Failed response to a call.
    Exception,
    /// Request with no reply.
    Oneway,
}

impl MessageKind {
    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Call => 1,
            Self::Reply => 2,
            Self::Exception => 3,
            Self::Oneway => 4,
        }
    }
}

impl TryFrom<u8> for MessageKind {
    type Error = ProtocolError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Call),
            2 => Ok(Self::Reply),
            3 => Ok(Self::Exception),
            4 => Ok(Self::Oneway),
            other => Err(ProtocolError::UnknownMessageKind(other)),
        }
    }
}

/// One decoded request or response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Method name.
    pub name: String,
    pub kind: MessageKind,
    /// Correlates replies with calls.
    pub sequence: i32,
    /// Opaque body. Its encoding is up to the processor.
    pub payload: Vec<u8>,
}

impl Message {
    /// Builds a call.
    pub fn call(name: impl Into<String>, sequence: i32, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            kind: MessageKind::Call,
            sequence,
            payload: payload.into(),
        }
    }

    /// Builds the reply to this message, keeping its name and sequence.
    #[must_use]
    pub fn reply(&self, payload: impl Into<Vec<u8>>) -> Self {
        self.respond(MessageKind::Reply, payload.into())
    }

    /// Builds an exception response to this message.
    #[must_use]
    pub fn exception(&self, detail: impl Into<String>) -> Self {
        self.respond(MessageKind::Exception, detail.into().into_bytes())
    }

    fn respond(&self, kind: MessageKind, payload: Vec<u8>) -> Self {
        Self {
            name: self.name.clone(),
            kind,
            sequence: self.sequence,
            payload,
        }
    }
}

/// Encodes and decodes messages over an owned transport.
pub trait Protocol: Send {
    /// Reads the next message, blocking until it is complete.
    fn read_message(&mut self) -> Result<Message, ProtocolError>;

    /// Writes `message` and flushes it to the peer.
    fn write_message(&mut self, message: &Message) -> Result<(), ProtocolError>;

    /// Underlying transport, used for `peek` and teardown.
    fn transport(&mut self) -> &mut dyn Transport;
}

/// Wraps a transport in a [`Protocol`]. Performs no I/O.
pub trait ProtocolFactory: Send + Sync {
    fn protocol(&self, transport: Box<dyn Transport>) -> Box<dyn Protocol>;
}
