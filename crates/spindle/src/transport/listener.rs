//! Listening transport for TCP and Unix socket endpoints.

use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

#[cfg(unix)]
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::FileTypeExt;
#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};
#[cfg(unix)]
use std::path::Path;

use spindle_config::SocketEndpoint;
use tracing::{info, warn};

use super::socket::{ConnectionStream, SocketTransport};
use super::{ServerTransport, TRANSPORT_TARGET, Transport};
use crate::error::{BindError, TransportError};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(10);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);

#[derive(Debug)]
enum ListenerKind {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl ListenerKind {
    fn set_nonblocking(&self) -> io::Result<()> {
        match self {
            Self::Tcp(listener) => listener.set_nonblocking(true),
            #[cfg(unix)]
            Self::Unix(listener) => listener.set_nonblocking(true),
        }
    }

    fn accept_stream(&self) -> io::Result<Option<ConnectionStream>> {
        let accepted = match self {
            Self::Tcp(listener) => listener
                .accept()
                .map(|(stream, _)| ConnectionStream::Tcp(stream)),
            #[cfg(unix)]
            Self::Unix(listener) => listener
                .accept()
                .map(|(stream, _)| ConnectionStream::Unix(stream)),
        };
        match accepted {
            Ok(stream) => Ok(Some(stream)),
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(error) => Err(error),
        }
    }
}

/// [`ServerTransport`] bound to a [`SocketEndpoint`].
///
/// `accept` polls a non-blocking listener, so [`ServerTransport::interrupt`]
/// from another thread ends a pending accept within a few milliseconds.
/// `close` releases the socket and a later `listen` binds it again.
#[derive(Debug)]
pub struct SocketServerTransport {
    endpoint: SocketEndpoint,
    listener: Mutex<Option<Arc<ListenerKind>>>,
    interrupted: AtomicBool,
}

impl SocketServerTransport {
    /// Creates an unbound transport for `endpoint`.
    #[must_use]
    pub fn new(endpoint: SocketEndpoint) -> Self {
        Self {
            endpoint,
            listener: Mutex::new(None),
            interrupted: AtomicBool::new(false),
        }
    }

    /// Creates a transport and binds it straight away.
    ///
    /// Useful when the caller needs [`Self::local_addr`] before serving.
    pub fn bind(endpoint: SocketEndpoint) -> Result<Self, TransportError> {
        let transport = Self::new(endpoint);
        transport.listen()?;
        Ok(transport)
    }

    /// Configured endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &SocketEndpoint {
        &self.endpoint
    }

    /// Bound TCP address. `None` for Unix endpoints or while unbound.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self.slot().as_deref() {
            Some(ListenerKind::Tcp(listener)) => listener.local_addr().ok(),
            _ => None,
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<ListenerKind>>> {
        self.listener
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    fn bind_listener(&self) -> Result<ListenerKind, BindError> {
        match &self.endpoint {
            SocketEndpoint::Tcp { host, port } => bind_tcp(host, *port).map(ListenerKind::Tcp),
            #[cfg(unix)]
            SocketEndpoint::Unix { path } => {
                bind_unix(path.as_std_path()).map(ListenerKind::Unix)
            }
            #[cfg(not(unix))]
            SocketEndpoint::Unix { .. } => Err(BindError::UnsupportedUnix {
                endpoint: self.endpoint.to_string(),
            }),
        }
    }
}

impl ServerTransport for SocketServerTransport {
    fn listen(&self) -> Result<(), TransportError> {
        let mut slot = self.slot();
        self.interrupted.store(false, Ordering::SeqCst);
        if slot.is_some() {
            return Ok(());
        }
        let listener = self.bind_listener()?;
        if let Err(source) = listener.set_nonblocking() {
            drop(listener);
            #[cfg(unix)]
            remove_unix_socket(&self.endpoint);
            return Err(BindError::NonBlocking { source }.into());
        }
        *slot = Some(Arc::new(listener));
        info!(
            target: TRANSPORT_TARGET,
            endpoint = %self.endpoint,
            "server transport listening"
        );
        Ok(())
    }

    fn accept(&self) -> Result<Box<dyn Transport>, TransportError> {
        let listener = self.slot().clone().ok_or(TransportError::NotOpen)?;
        loop {
            if self.interrupted.load(Ordering::SeqCst) {
                return Err(TransportError::Interrupted);
            }
            match listener.accept_stream() {
                Ok(Some(stream)) => return Ok(Box::new(SocketTransport::from_stream(stream)?)),
                Ok(None) => thread::sleep(ACCEPT_BACKOFF),
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => {
                    // Keeps descriptor exhaustion and similar persistent
                    // failures from spinning the accept loop.
                    thread::sleep(ERROR_BACKOFF);
                    return Err(error.into());
                }
            }
        }
    }

    fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    fn close(&self) -> Result<(), TransportError> {
        self.interrupt();
        let Some(listener) = self.slot().take() else {
            return Ok(());
        };
        drop(listener);
        #[cfg(unix)]
        remove_unix_socket(&self.endpoint);
        info!(
            target: TRANSPORT_TARGET,
            endpoint = %self.endpoint,
            "server transport closed"
        );
        Ok(())
    }
}

fn bind_tcp(host: &str, port: u16) -> Result<TcpListener, BindError> {
    let addr = (host, port)
        .to_socket_addrs()
        .map_err(|source| BindError::Resolve {
            host: host.to_owned(),
            port,
            source,
        })?
        .next()
        .ok_or_else(|| BindError::ResolveEmpty {
            host: host.to_owned(),
            port,
        })?;
    TcpListener::bind(addr).map_err(|source| BindError::BindTcp { addr, source })
}

#[cfg(unix)]
fn bind_unix(path: &Path) -> Result<UnixListener, BindError> {
    let display = || path.display().to_string();
    if path.exists() {
        let metadata = fs::symlink_metadata(path).map_err(|source| BindError::UnixProbe {
            path: display(),
            source,
        })?;
        if !metadata.file_type().is_socket() {
            return Err(BindError::UnixNotSocket { path: display() });
        }
        match UnixStream::connect(path) {
            Ok(_live) => return Err(BindError::UnixInUse { path: display() }),
            Err(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound
                ) =>
            {
                fs::remove_file(path).map_err(|source| BindError::UnixCleanup {
                    path: display(),
                    source,
                })?;
            }
            Err(source) => {
                return Err(BindError::UnixProbe {
                    path: display(),
                    source,
                });
            }
        }
    }

    UnixListener::bind(path).map_err(|source| BindError::BindUnix {
        path: display(),
        source,
    })
}

#[cfg(unix)]
fn remove_unix_socket(endpoint: &SocketEndpoint) {
    let Some(path) = endpoint.unix_path() else {
        return;
    };
    if let Err(error) = fs::remove_file(path.as_std_path())
        && error.kind() != io::ErrorKind::NotFound
    {
        warn!(
            target: TRANSPORT_TARGET,
            error = %error,
            path = %path,
            "failed to remove unix socket file"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpStream;
    use std::time::Instant;

    use super::*;

    fn tcp_transport() -> SocketServerTransport {
        SocketServerTransport::bind(SocketEndpoint::tcp("127.0.0.1", 0)).expect("bind tcp")
    }

    #[test]
    fn accepts_tcp_clients() {
        let transport = tcp_transport();
        let addr = transport.local_addr().expect("tcp address");
        let _client = TcpStream::connect(addr).expect("connect client");

        let mut accepted = transport.accept().expect("accept client");
        assert!(accepted.is_open());
        accepted.close().expect("close accepted connection");
    }

    #[test]
    fn interrupt_breaks_a_blocked_accept() {
        let transport = Arc::new(tcp_transport());
        let acceptor = {
            let transport = Arc::clone(&transport);
            thread::spawn(move || transport.accept())
        };
        thread::sleep(Duration::from_millis(50));
        let started = Instant::now();
        transport.interrupt();

        let error = acceptor
            .join()
            .expect("join acceptor")
            .expect_err("accept should be interrupted");
        assert!(error.is_interrupted());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn listen_clears_a_previous_interrupt() {
        let transport = tcp_transport();
        transport.interrupt();
        assert!(matches!(
            transport.accept(),
            Err(TransportError::Interrupted)
        ));

        transport.listen().expect("listen again");
        let addr = transport.local_addr().expect("tcp address");
        let _client = TcpStream::connect(addr).expect("connect client");
        transport.accept().expect("accept after relisten");
    }

    #[test]
    fn accept_after_close_reports_not_open() {
        let transport = tcp_transport();
        transport.close().expect("close");
        transport.close().expect("second close is a no-op");
        assert!(matches!(transport.accept(), Err(TransportError::NotOpen)));
        assert!(transport.local_addr().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn unix_transport_replaces_stale_socket_and_cleans_up() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("spindled.sock");
        {
            let _stale = UnixListener::bind(&path).expect("bind stale listener");
        }
        assert!(path.exists(), "stale socket should remain");

        let endpoint = SocketEndpoint::unix(path.to_str().expect("utf8 path"));
        let transport = SocketServerTransport::bind(endpoint).expect("bind over stale socket");
        let _client = UnixStream::connect(&path).expect("connect unix client");
        transport.accept().expect("accept unix client");

        transport.close().expect("close");
        assert!(!path.exists(), "close should remove the socket file");
    }

    #[cfg(unix)]
    #[test]
    fn unix_transport_refuses_live_socket() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("spindled.sock");
        let _existing = UnixListener::bind(&path).expect("bind existing listener");

        let endpoint = SocketEndpoint::unix(path.to_str().expect("utf8 path"));
        let error = SocketServerTransport::bind(endpoint).expect_err("bind should fail");
        assert!(matches!(
            error,
            TransportError::Bind(BindError::UnixInUse { .. })
        ));
    }
}
