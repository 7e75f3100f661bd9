//! Error types shared by transports, protocols, processors, and the server.
//!
//! Failures fall into three classes that decide how the server reacts:
//! transport failures (with a distinguished "interrupted" kind raised when
//! shutdown breaks a blocked accept), framework failures, and unrecognised
//! failures. [`Error::class`] maps every error onto a [`FailureClass`].

use std::any::Any;
use std::io;
use std::net::SocketAddr;
use std::string::FromUtf8Error;

use thiserror::Error;

/// Failures raised by byte-stream transports.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A blocked operation was broken by [`crate::ServerTransport::interrupt`].
    #[error("transport interrupted")]
    Interrupted,
    /// The transport was used before `listen` or after `close`.
    #[error("transport is not open")]
    NotOpen,
    /// The peer closed the stream before the expected bytes arrived.
    #[error("peer closed the connection")]
    EndOfFile,
    /// A socket timeout elapsed.
    #[error("transport timed out: {source}")]
    TimedOut {
        #[source]
        source: io::Error,
    },
    /// Any other I/O failure.
    #[error("transport I/O failure: {source}")]
    Io {
        #[source]
        source: io::Error,
    },
    /// The listening endpoint could not be bound.
    #[error(transparent)]
    Bind(#[from] BindError),
}

impl TransportError {
    /// Whether this is the shutdown interruption rather than a real failure.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

impl From<io::Error> for TransportError {
    fn from(source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::UnexpectedEof => Self::EndOfFile,
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::TimedOut { source },
            _ => Self::Io { source },
        }
    }
}

/// Failures raised while binding a listening endpoint.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("failed to resolve TCP address {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("no TCP addresses resolved for {host}:{port}")]
    ResolveEmpty { host: String, port: u16 },
    #[error("failed to bind TCP listener at {addr}: {source}")]
    BindTcp {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to enable non-blocking accept: {source}")]
    NonBlocking {
        #[source]
        source: io::Error,
    },
    #[cfg(not(unix))]
    #[error("unix sockets are unsupported for endpoint {endpoint}")]
    UnsupportedUnix { endpoint: String },
    #[cfg(unix)]
    #[error("failed to bind unix listener at {path}: {source}")]
    BindUnix {
        path: String,
        #[source]
        source: io::Error,
    },
    #[cfg(unix)]
    #[error("unix socket {path} is already served by another process")]
    UnixInUse { path: String },
    #[cfg(unix)]
    #[error("unix socket path {path} exists and is not a socket")]
    UnixNotSocket { path: String },
    #[cfg(unix)]
    #[error("failed to inspect unix socket {path}: {source}")]
    UnixProbe {
        path: String,
        #[source]
        source: io::Error,
    },
    #[cfg(unix)]
    #[error("failed to remove stale unix socket {path}: {source}")]
    UnixCleanup {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Failures raised while encoding or decoding messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The underlying transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The message header did not carry the expected version marker.
    #[error("bad protocol version header {found:#010x}")]
    BadVersion { found: u32 },
    /// The header named a message kind this codec does not know.
    #[error("unknown message kind {0}")]
    UnknownMessageKind(u8),
    /// A length prefix exceeded the configured frame limit.
    #[error("{what} of {size} bytes exceeds the {limit} byte limit")]
    SizeLimit {
        what: &'static str,
        size: usize,
        limit: usize,
    },
    /// The message name was not UTF-8.
    #[error("message name is not valid UTF-8: {0}")]
    InvalidName(#[source] FromUtf8Error),
}

impl From<io::Error> for ProtocolError {
    fn from(source: io::Error) -> Self {
        Self::Transport(source.into())
    }
}

/// Failure returned by processors and by the server's accept step.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// The processor rejected a request.
    #[error("application error: {message}")]
    Application { message: String },
    /// No worker thread could be started for an accepted connection.
    #[error("failed to start connection worker: {source}")]
    Spawn {
        #[source]
        source: io::Error,
    },
    /// A failure of no recognised kind, including a caught panic.
    #[error("unrecognised failure: {message}")]
    Unknown { message: String },
}

impl Error {
    /// Builds an [`Error::Application`].
    pub fn application(message: impl Into<String>) -> Self {
        Self::Application {
            message: message.into(),
        }
    }

    /// Builds an [`Error::Unknown`].
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
        }
    }

    /// Converts a panic payload caught by `catch_unwind` into an
    /// [`Error::Unknown`].
    #[must_use]
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(message) => (*message).to_owned(),
                Err(_) => String::from("panic with a non-string payload"),
            },
        };
        Self::Unknown { message }
    }

    /// Classifies the error for the accept loop and connection tasks.
    #[must_use]
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Transport(error) | Self::Protocol(ProtocolError::Transport(error)) => {
                FailureClass::Transport {
                    interrupted: error.is_interrupted(),
                }
            }
            Self::Protocol(_) | Self::Application { .. } | Self::Spawn { .. } => {
                FailureClass::Framework
            }
            Self::Unknown { .. } => FailureClass::Unknown,
        }
    }
}

/// How severe a failure is from the server's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The byte stream failed. `interrupted` marks the shutdown interruption.
    Transport { interrupted: bool },
    /// A protocol, application, or resource failure.
    Framework,
    /// Anything else. Fatal to the accept loop.
    Unknown,
}

/// Reasons [`crate::ThreadedServer::serve`] returns early.
#[derive(Debug, Error)]
pub enum ServeError {
    /// The initial `listen` failed, so no connection was ever accepted.
    #[error("failed to listen on server transport: {source}")]
    Listen {
        #[source]
        source: TransportError,
    },
    /// An unrecognised failure ended the accept loop without draining.
    #[error("accept loop terminated: {source}")]
    Fatal {
        #[source]
        source: Error,
    },
}
