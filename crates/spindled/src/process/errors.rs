//! Unified error surface for daemon launch and supervision.

use std::io;
use std::sync::Arc;

use ortho_config::OrthoError;
use spindle::ServeError;
use spindle_config::SocketPreparationError;
use thiserror::Error;

use super::shutdown::ShutdownError;
use crate::telemetry::TelemetryError;

/// Errors surfaced while launching or running the daemon.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to load configuration: {source}")]
    Config {
        #[source]
        source: Arc<OrthoError>,
    },
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        #[source]
        source: TelemetryError,
    },
    #[error("failed to prepare daemon socket: {source}")]
    Socket {
        #[source]
        source: SocketPreparationError,
    },
    /// The shutdown watcher thread could not be started.
    #[error("failed to start shutdown watcher: {source}")]
    Watcher {
        #[source]
        source: io::Error,
    },
    #[error("failed to await shutdown signal: {source}")]
    Shutdown {
        #[source]
        source: ShutdownError,
    },
    /// The server failed to listen or its accept loop stopped on an
    /// unrecognised failure.
    #[error("server stopped: {source}")]
    Serve {
        #[source]
        source: ServeError,
    },
}

impl From<Arc<OrthoError>> for LaunchError {
    fn from(source: Arc<OrthoError>) -> Self {
        Self::Config { source }
    }
}

impl From<TelemetryError> for LaunchError {
    fn from(source: TelemetryError) -> Self {
        Self::Telemetry { source }
    }
}

impl From<SocketPreparationError> for LaunchError {
    fn from(source: SocketPreparationError) -> Self {
        Self::Socket { source }
    }
}

impl From<ShutdownError> for LaunchError {
    fn from(source: ShutdownError) -> Self {
        Self::Shutdown { source }
    }
}

impl From<ServeError> for LaunchError {
    fn from(source: ServeError) -> Self {
        Self::Serve { source }
    }
}
