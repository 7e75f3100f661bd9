//! Shared configuration for the spindle server and its daemon.
//!
//! [`Config`] is layered by `ortho_config`. Built-in defaults come first,
//! then an optional configuration file (`--config-path` or
//! `SPINDLE_CONFIG_PATH`), then `SPINDLE_*` environment variables, and
//! command-line flags last.

mod defaults;
mod logging;
mod socket;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_MAX_FRAME_BYTES, DEFAULT_TCP_PORT, default_listen_socket,
    default_log_filter, default_log_filter_string, default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "SPINDLE")]
pub struct Config {
    /// Endpoint the server accepts connections on.
    #[ortho_config(default = default_listen_socket())]
    pub listen_socket: SocketEndpoint,
    /// `tracing` filter directive, e.g. `info` or `spindle=debug`.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Log record format.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Largest accepted message name or payload, in bytes.
    #[ortho_config(default = DEFAULT_MAX_FRAME_BYTES)]
    pub max_frame_bytes: usize,
    /// Stack size for connection worker threads; platform default when unset.
    pub worker_stack_size: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_socket: default_listen_socket(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            worker_stack_size: None,
        }
    }
}

impl Config {
    /// Endpoint the server listens on.
    #[must_use]
    pub fn listen_socket(&self) -> &SocketEndpoint {
        &self.listen_socket
    }

    /// Log filter directive.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Frame size limit for the binary protocol.
    #[must_use]
    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    /// Worker thread stack size, if one was configured.
    #[must_use]
    pub fn worker_stack_size(&self) -> Option<usize> {
        self.worker_stack_size
    }
}
