//! Stream transport over TCP and Unix domain sockets.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};

#[cfg(unix)]
use std::os::unix::net::UnixStream;

use spindle_config::SocketEndpoint;
use tracing::debug;

use super::{TRANSPORT_TARGET, Transport};
use crate::error::TransportError;

/// Concrete socket behind a [`SocketTransport`].
#[derive(Debug)]
pub(crate) enum ConnectionStream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl ConnectionStream {
    fn try_clone(&self) -> io::Result<Self> {
        match self {
            Self::Tcp(stream) => stream.try_clone().map(Self::Tcp),
            #[cfg(unix)]
            Self::Unix(stream) => stream.try_clone().map(Self::Unix),
        }
    }

    fn shutdown(&self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.shutdown(Shutdown::Both),
            #[cfg(unix)]
            Self::Unix(stream) => stream.shutdown(Shutdown::Both),
        }
    }

    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.set_nonblocking(nonblocking),
            #[cfg(unix)]
            Self::Unix(stream) => stream.set_nonblocking(nonblocking),
        }
    }

    fn peek_byte(&self) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.peek(&mut [0_u8; 1]),
            #[cfg(unix)]
            Self::Unix(stream) => {
                // `UnixStream::peek` is unstable; go through the raw socket.
                let mut byte = [std::mem::MaybeUninit::<u8>::uninit(); 1];
                socket2::SockRef::from(stream).peek(&mut byte)
            }
        }
    }
}

impl Read for ConnectionStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for ConnectionStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Self::Unix(stream) => stream.flush(),
        }
    }
}

/// Blocking transport over a connected socket.
///
/// Cloned handles share the socket. Closing any of them shuts the socket
/// down in both directions for all of them.
#[derive(Debug)]
pub struct SocketTransport {
    stream: Option<ConnectionStream>,
}

impl SocketTransport {
    pub(crate) fn from_stream(stream: ConnectionStream) -> io::Result<Self> {
        // Accepted sockets can inherit the listener's non-blocking mode.
        stream.set_nonblocking(false)?;
        Ok(Self {
            stream: Some(stream),
        })
    }

    /// Connects to `endpoint` as a client.
    pub fn connect(endpoint: &SocketEndpoint) -> Result<Self, TransportError> {
        let stream = match endpoint {
            SocketEndpoint::Tcp { host, port } => {
                let addrs = (host.as_str(), *port).to_socket_addrs()?;
                ConnectionStream::Tcp(TcpStream::connect(addrs.collect::<Vec<_>>().as_slice())?)
            }
            #[cfg(unix)]
            SocketEndpoint::Unix { path } => {
                ConnectionStream::Unix(UnixStream::connect(path.as_std_path())?)
            }
            #[cfg(not(unix))]
            SocketEndpoint::Unix { .. } => {
                return Err(io::Error::from(io::ErrorKind::Unsupported).into());
            }
        };
        Ok(Self::from_stream(stream)?)
    }

    fn stream(&mut self) -> Result<&mut ConnectionStream, TransportError> {
        self.stream.as_mut().ok_or(TransportError::NotOpen)
    }
}

impl Transport for SocketTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let stream = self.stream()?;
        loop {
            match stream.read(buf) {
                Ok(read) => return Ok(read),
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => return Err(error.into()),
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        Ok(self.stream()?.write_all(buf)?)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        Ok(self.stream()?.flush()?)
    }

    fn peek(&mut self) -> Result<bool, TransportError> {
        let stream = self.stream()?;
        loop {
            match stream.peek_byte() {
                Ok(available) => return Ok(available > 0),
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) if error.kind() == io::ErrorKind::ConnectionReset => return Ok(false),
                Err(error) => return Err(error.into()),
            }
        }
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };
        match stream.shutdown() {
            Ok(()) => Ok(()),
            // Another handle on the same socket already shut it down.
            Err(error) if error.kind() == io::ErrorKind::NotConnected => {
                debug!(target: TRANSPORT_TARGET, "socket already shut down");
                Ok(())
            }
            Err(error) => Err(error.into()),
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn try_clone(&self) -> Result<Box<dyn Transport>, TransportError> {
        let stream = self.stream.as_ref().ok_or(TransportError::NotOpen)?;
        Ok(Box::new(Self {
            stream: Some(stream.try_clone()?),
        }))
    }
}
