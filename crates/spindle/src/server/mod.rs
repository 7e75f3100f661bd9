//! Thread-per-connection server.
//!
//! [`ThreadedServer::serve`] runs the accept loop on the calling thread.
//! Every accepted connection is wrapped by the configured factories,
//! registered, and handed to its own worker. Setting the stop flag through a
//! [`StopHandle`] ends the loop; `serve` then closes the listening transport
//! and waits until every worker has deregistered.

mod builder;
mod pending;

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, info, warn};

use self::pending::PendingConnection;
use crate::error::{Error, FailureClass, ServeError};
use crate::event::ServerEventHandler;
use crate::processor::Processor;
use crate::protocol::ProtocolFactory;
use crate::registry::{TaskId, TaskRegistry};
use crate::task::ConnectionTask;
use crate::thread::ThreadFactory;
use crate::transport::{ServerTransport, TransportFactory};

pub use self::builder::ThreadedServerBuilder;

pub(crate) const SERVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::server");

/// Result of one accept-loop iteration.
#[derive(Debug)]
pub enum AcceptOutcome {
    /// A connection task was registered and its worker started.
    Launched(TaskId),
    /// The accept was interrupted because a stop was requested.
    Interrupted,
    /// A transport or framework failure. The loop carries on.
    Recoverable(Error),
    /// An unrecognised failure. The loop stops.
    Fatal(Error),
}

/// Requests that a running [`ThreadedServer`] stop accepting connections.
#[derive(Clone)]
pub struct StopHandle {
    stop: Arc<AtomicBool>,
    server_transport: Arc<dyn ServerTransport>,
}

impl StopHandle {
    /// Sets the stop flag, then interrupts any accept blocked on the
    /// listening transport.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.server_transport.interrupt();
    }

    /// Whether a stop has been requested and not yet completed.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for StopHandle {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("StopHandle")
            .field("stop_requested", &self.is_stop_requested())
            .finish_non_exhaustive()
    }
}

/// Server that runs each connection on a dedicated worker thread.
pub struct ThreadedServer {
    processor: Arc<dyn Processor>,
    server_transport: Arc<dyn ServerTransport>,
    input_transport_factory: Arc<dyn TransportFactory>,
    output_transport_factory: Arc<dyn TransportFactory>,
    input_protocol_factory: Arc<dyn ProtocolFactory>,
    output_protocol_factory: Arc<dyn ProtocolFactory>,
    thread_factory: Arc<dyn ThreadFactory>,
    event_handler: Arc<dyn ServerEventHandler>,
    registry: Arc<TaskRegistry>,
    stop: Arc<AtomicBool>,
}

impl ThreadedServer {
    /// Starts configuring a server for `processor` on `server_transport`.
    pub fn builder(
        processor: impl Processor + 'static,
        server_transport: Arc<dyn ServerTransport>,
    ) -> ThreadedServerBuilder {
        ThreadedServerBuilder::new(Arc::new(processor), server_transport)
    }

    /// Server with every collaborator at its default.
    pub fn new(
        processor: impl Processor + 'static,
        server_transport: Arc<dyn ServerTransport>,
    ) -> Self {
        Self::builder(processor, server_transport).build()
    }

    /// Listens and runs the accept loop until a stop is requested.
    ///
    /// After a requested stop the listening transport is closed, every live
    /// connection task is awaited, and the stop flag is cleared so `serve`
    /// can run again.
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::Listen`] when listening fails; the loop never
    /// runs. Returns [`ServeError::Fatal`] when an unrecognised failure ends
    /// the loop. If a stop was already requested the server still drains and
    /// clears the flag first. Otherwise nothing is drained or closed:
    /// connection tasks keep running and the caller decides whether to
    /// [`Self::drain`].
    pub fn serve(&self) -> Result<(), ServeError> {
        if let Err(source) = self.server_transport.listen() {
            error!(
                target: SERVER_TARGET,
                error = %source,
                "server transport failed to listen"
            );
            return Err(ServeError::Listen { source });
        }

        self.event_handler.pre_serve();
        info!(target: SERVER_TARGET, "accept loop started");

        while !self.is_stop_requested() {
            match self.accept_step() {
                AcceptOutcome::Launched(task_id) => debug!(
                    target: SERVER_TARGET,
                    %task_id,
                    active = self.registry.len(),
                    "client task launched"
                ),
                AcceptOutcome::Interrupted => {}
                AcceptOutcome::Recoverable(error) => log_recoverable(&error),
                AcceptOutcome::Fatal(error) => {
                    error!(
                        target: SERVER_TARGET,
                        error = %error,
                        active = self.registry.len(),
                        "accept loop terminated by an unrecognised failure"
                    );
                    if self.is_stop_requested() {
                        self.drain();
                        self.stop.store(false, Ordering::SeqCst);
                    }
                    return Err(ServeError::Fatal { source: error });
                }
            }
        }

        self.drain();
        self.stop.store(false, Ordering::SeqCst);
        info!(target: SERVER_TARGET, "server stopped");
        Ok(())
    }

    /// Accepts one connection and launches its task.
    ///
    /// Never panics: a panic in any collaborator is reported as
    /// [`AcceptOutcome::Fatal`]. Every transport built before a failure is
    /// closed.
    pub fn accept_step(&self) -> AcceptOutcome {
        let mut pending = PendingConnection::default();
        let launched = panic::catch_unwind(AssertUnwindSafe(|| self.launch(&mut pending)))
            .unwrap_or_else(|payload| Err(Error::from_panic(payload)));
        match launched {
            Ok(task_id) => AcceptOutcome::Launched(task_id),
            Err(error) => {
                pending.close_all();
                self.classify(error)
            }
        }
    }

    fn launch(&self, pending: &mut PendingConnection) -> Result<TaskId, Error> {
        let client = pending.client.insert(self.server_transport.accept()?);
        pending.input = Some(self.input_transport_factory.transport(&**client)?);
        pending.output = Some(self.output_transport_factory.transport(&**client)?);
        let (input, output) = pending
            .take_wrapped()
            .ok_or_else(|| Error::unknown("wrapped transports missing after setup"))?;
        let input = self.input_protocol_factory.protocol(input);
        let output = self.output_protocol_factory.protocol(output);

        let ticket = self.registry.register();
        let task_id = ticket.id();
        let task = ConnectionTask::new(
            ticket,
            Arc::clone(&self.processor),
            Arc::clone(&self.event_handler),
            input,
            output,
        );
        // A failed spawn drops the task, and with it the ticket.
        self.thread_factory
            .spawn(Box::new(move || task.run()))
            .map_err(|source| Error::Spawn { source })?;
        Ok(task_id)
    }

    fn classify(&self, error: Error) -> AcceptOutcome {
        match error.class() {
            FailureClass::Transport { interrupted: true } if self.is_stop_requested() => {
                AcceptOutcome::Interrupted
            }
            FailureClass::Unknown => AcceptOutcome::Fatal(error),
            FailureClass::Transport { .. } | FailureClass::Framework => {
                AcceptOutcome::Recoverable(error)
            }
        }
    }

    /// Closes the listening transport and waits for every connection task.
    ///
    /// A close failure is logged and does not stop the wait.
    pub fn drain(&self) {
        if let Err(error) = self.server_transport.close() {
            warn!(
                target: SERVER_TARGET,
                error = %error,
                "failed to close server transport during shutdown"
            );
        }
        let active = self.registry.len();
        if active > 0 {
            info!(
                target: SERVER_TARGET,
                active,
                "waiting for client tasks to finish"
            );
        }
        self.registry.wait_until_drained();
    }

    /// Handle that stops this server from any thread.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            stop: Arc::clone(&self.stop),
            server_transport: Arc::clone(&self.server_transport),
        }
    }

    /// Same as [`StopHandle::stop`].
    pub fn stop(&self) {
        self.stop_handle().stop();
    }

    /// Whether a stop has been requested and `serve` has not yet cleared it.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Number of registered connection tasks.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.registry.len()
    }

    /// Registry tracking this server's live connection tasks.
    #[must_use]
    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }
}

impl fmt::Debug for ThreadedServer {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ThreadedServer")
            .field("registry", &self.registry)
            .field("stop_requested", &self.is_stop_requested())
            .finish_non_exhaustive()
    }
}

fn log_recoverable(error: &Error) {
    match error.class() {
        FailureClass::Transport { .. } => warn!(
            target: SERVER_TARGET,
            error = %error,
            "server transport failed on accept"
        ),
        FailureClass::Framework | FailureClass::Unknown => warn!(
            target: SERVER_TARGET,
            error = %error,
            "failed to launch client task"
        ),
    }
}
