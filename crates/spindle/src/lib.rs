//! Thread-per-connection RPC server core.
//!
//! A [`ThreadedServer`] accepts connections from a [`ServerTransport`], wraps
//! each one with input and output [`TransportFactory`] and
//! [`ProtocolFactory`] instances, and runs a [`ConnectionTask`] for it on a
//! worker produced by a [`ThreadFactory`]. Every task is registered in a
//! [`TaskRegistry`] before its worker starts and releases its [`TaskTicket`]
//! as the last step of teardown.
//!
//! Stopping is cooperative. [`StopHandle::stop`] sets a flag and interrupts
//! the blocked accept; the accept loop then closes the listening transport
//! and waits for the registry to drain before `serve` returns. In-flight
//! connections are never cut short.
//!
//! Failures are classified by [`Error::class`]. Transport and framework
//! failures during accept are logged and the loop continues. An
//! unrecognised failure ends the loop immediately with
//! [`ServeError::Fatal`], without draining; callers that want a clean exit
//! follow it with [`ThreadedServer::drain`].

mod error;
mod event;
mod processor;
mod protocol;
mod registry;
mod server;
mod task;
mod thread;
mod transport;

pub use error::{BindError, Error, FailureClass, ProtocolError, ServeError, TransportError};
pub use event::{NoopEventHandler, ServerEventHandler};
pub use processor::Processor;
pub use protocol::{
    BinaryProtocol, BinaryProtocolFactory, Message, MessageKind, Protocol, ProtocolFactory,
};
pub use registry::{TaskId, TaskRegistry, TaskTicket};
pub use server::{AcceptOutcome, StopHandle, ThreadedServer, ThreadedServerBuilder};
pub use task::ConnectionTask;
pub use thread::{Job, StdThreadFactory, ThreadFactory};
pub use transport::{
    BufferedTransport, BufferedTransportFactory, PassthroughTransportFactory, ServerTransport,
    SocketServerTransport, SocketTransport, Transport, TransportFactory,
};

#[cfg(test)]
mod tests;
