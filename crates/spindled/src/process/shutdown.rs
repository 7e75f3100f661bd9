use std::io;
use std::sync::{Mutex, MutexGuard};

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use thiserror::Error;
use tracing::info;

use super::PROCESS_TARGET;

/// Abstraction over shutdown notification mechanisms.
pub trait ShutdownSignal: Send + Sync {
    /// Blocks until shutdown should proceed.
    fn wait(&self) -> Result<(), ShutdownError>;

    /// Releases a current or future [`Self::wait`] without a shutdown
    /// request. Used when the daemon exits on its own.
    fn cancel(&self);
}

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("failed to install signal handlers: {source}")]
    Install {
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Default)]
struct ListenerState {
    cancelled: bool,
    handle: Option<Handle>,
}

/// Shutdown listener that waits for termination signals.
///
/// Handlers are installed on the first `wait` and removed when it returns.
#[derive(Debug, Default)]
pub struct SystemShutdownSignal {
    state: Mutex<ListenerState>,
}

impl SystemShutdownSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ListenerState> {
        self.state
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        let mut signals = {
            let mut state = self.state();
            if state.cancelled {
                return Ok(());
            }
            let signals = Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGHUP])
                .map_err(|source| ShutdownError::Install { source })?;
            state.handle = Some(signals.handle());
            signals
        };
        if let Some(signal) = signals.forever().next() {
            info!(
                target: PROCESS_TARGET,
                signal,
                "shutdown signal received"
            );
        }
        self.state().handle = None;
        Ok(())
    }

    fn cancel(&self) {
        let mut state = self.state();
        state.cancelled = true;
        if let Some(handle) = state.handle.take() {
            handle.close();
        }
    }
}
