//! Byte-stream transports and the factories that wrap accepted connections.
//!
//! A [`ServerTransport`] produces raw connections. The server then asks an
//! input and an output [`TransportFactory`] to wrap each one, so the two
//! directions of a single stream can be buffered or framed independently.

mod buffered;
mod listener;
mod socket;

use crate::error::TransportError;

pub use self::buffered::{BufferedTransport, BufferedTransportFactory};
pub use self::listener::SocketServerTransport;
pub use self::socket::SocketTransport;

const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

/// One end of an established byte stream.
///
/// A transport is owned by exactly one connection task, so methods take
/// `&mut self`.
pub trait Transport: Send {
    /// Reads up to `buf.len()` bytes. `Ok(0)` means the peer closed the
    /// stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Writes all of `buf`.
    fn write(&mut self, buf: &[u8]) -> Result<(), TransportError>;

    /// Pushes buffered output to the peer.
    fn flush(&mut self) -> Result<(), TransportError>;

    /// Reports whether more bytes can be read.
    ///
    /// Returns `false` once the peer has closed its side. Implementations may
    /// block until the answer is known.
    fn peek(&mut self) -> Result<bool, TransportError>;

    /// Closes the transport. Calling it again is harmless.
    fn close(&mut self) -> Result<(), TransportError>;

    /// Whether the transport is still open.
    fn is_open(&self) -> bool;

    /// Opens another handle onto the same underlying stream.
    fn try_clone(&self) -> Result<Box<dyn Transport>, TransportError>;
}

impl std::fmt::Debug for dyn Transport {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Transport")
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

/// A listening endpoint that hands out connections.
///
/// The server and its [`crate::StopHandle`] share one instance across
/// threads, so every method takes `&self`.
pub trait ServerTransport: Send + Sync {
    /// Starts listening. Also clears a previous interruption.
    fn listen(&self) -> Result<(), TransportError>;

    /// Blocks until a client connects.
    ///
    /// Fails with [`TransportError::Interrupted`] once [`Self::interrupt`]
    /// has been called.
    fn accept(&self) -> Result<Box<dyn Transport>, TransportError>;

    /// Breaks a blocked or future [`Self::accept`] until the next `listen`.
    fn interrupt(&self);

    /// Stops listening and releases the endpoint.
    fn close(&self) -> Result<(), TransportError>;
}

/// Wraps a raw accepted connection for one direction of traffic.
pub trait TransportFactory: Send + Sync {
    /// Produces a transport over the same stream as `client`.
    fn transport(&self, client: &dyn Transport) -> Result<Box<dyn Transport>, TransportError>;
}

/// Uses the raw connection as-is.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughTransportFactory;

impl TransportFactory for PassthroughTransportFactory {
    fn transport(&self, client: &dyn Transport) -> Result<Box<dyn Transport>, TransportError> {
        client.try_clone()
    }
}
