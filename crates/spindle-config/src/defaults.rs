use camino::Utf8PathBuf;

#[cfg(unix)]
use dirs::runtime_dir;
#[cfg(unix)]
use libc::geteuid;

use crate::logging::LogFormat;
use crate::socket::SocketEndpoint;

/// TCP port used when Unix domain sockets are unavailable.
pub const DEFAULT_TCP_PORT: u16 = 9797;

/// Log filter applied when none is configured.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Upper bound on a single message name or payload, in bytes.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Default log filter expression.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned default log filter, for places that need a `String`.
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default log output format.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Endpoint the daemon listens on when none is configured.
///
/// On Unix this is `spindled.sock` inside a `spindle` directory under the
/// user's runtime directory, falling back to a per-uid directory in the
/// system temp dir. Elsewhere it is loopback TCP on [`DEFAULT_TCP_PORT`].
#[must_use]
pub fn default_listen_socket() -> SocketEndpoint {
    default_listen_socket_inner()
}

#[cfg(unix)]
fn default_listen_socket_inner() -> SocketEndpoint {
    let mut base = match runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok()) {
        Some(dir) => dir.join("spindle"),
        None => temp_base_directory()
            .join("spindle")
            .join(format!("uid-{}", unsafe { geteuid() })),
    };
    base.push("spindled.sock");
    SocketEndpoint::unix(base)
}

#[cfg(unix)]
fn temp_base_directory() -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(std::env::temp_dir()).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

#[cfg(not(unix))]
fn default_listen_socket_inner() -> SocketEndpoint {
    SocketEndpoint::tcp("127.0.0.1", DEFAULT_TCP_PORT)
}
