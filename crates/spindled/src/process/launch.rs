//! Supervises daemon launch sequencing and runtime orchestration.

use std::sync::Arc;
use std::thread;

use spindle::{
    BinaryProtocolFactory, BufferedTransportFactory, ServeError, SocketServerTransport,
    StdThreadFactory, StopHandle, ThreadedServer,
};
use spindle_config::Config;
use tracing::{error, info, warn};

use crate::bootstrap::{ConfigLoader, SystemConfigLoader};
use crate::events::StructuredEventHandler;
use crate::service::EchoService;
use crate::telemetry;

use super::errors::LaunchError;
use super::shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};
use super::PROCESS_TARGET;

const WORKER_PREFIX: &str = "spindled-conn";
const WATCHER_NAME: &str = "spindled-shutdown";

/// Runs the daemon using the production collaborators.
pub fn run_daemon() -> Result<(), LaunchError> {
    run_daemon_with(&SystemConfigLoader, SystemShutdownSignal::new())
}

/// Runs the daemon with injected collaborators.
///
/// Returns once `shutdown` has fired and every open connection has finished.
/// When serving fails, `shutdown` is cancelled and its watcher joined before
/// the error is returned.
pub fn run_daemon_with<L, S>(loader: &L, shutdown: S) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    S: ShutdownSignal + 'static,
{
    let config = loader.load()?;
    telemetry::initialise(&config)?;
    info!(
        target: PROCESS_TARGET,
        endpoint = %config.listen_socket(),
        "starting daemon runtime"
    );
    config.listen_socket().prepare_filesystem()?;

    let server = build_server(&config);
    let shutdown = Arc::new(shutdown);
    let watcher = spawn_shutdown_watcher(Arc::clone(&shutdown), server.stop_handle())?;

    if let Err(error) = server.serve() {
        if matches!(error, ServeError::Fatal { .. }) {
            error!(
                target: PROCESS_TARGET,
                error = %error,
                "server failed; draining open connections"
            );
            server.drain();
        }
        shutdown.cancel();
        if let Err(watch_error) = join_watcher(watcher) {
            warn!(
                target: PROCESS_TARGET,
                error = %watch_error,
                "shutdown listener failed after the server stopped"
            );
        }
        return Err(error.into());
    }

    join_watcher(watcher)?;
    info!(
        target: PROCESS_TARGET,
        "shutdown sequence completed"
    );
    Ok(())
}

fn build_server(config: &Config) -> ThreadedServer {
    let listener = Arc::new(SocketServerTransport::new(config.listen_socket().clone()));
    ThreadedServer::builder(EchoService, listener)
        .transport_factory(BufferedTransportFactory::default())
        .protocol_factory(BinaryProtocolFactory::new(config.max_frame_bytes()))
        .thread_factory(
            StdThreadFactory::new(WORKER_PREFIX).with_stack_size(config.worker_stack_size()),
        )
        .event_handler(StructuredEventHandler::new())
        .build()
}

/// Waits for `shutdown` on its own thread and stops the server afterwards.
///
/// The server is stopped even when waiting fails, so `serve` always returns.
fn spawn_shutdown_watcher<S>(
    shutdown: Arc<S>,
    stopper: StopHandle,
) -> Result<thread::JoinHandle<Result<(), ShutdownError>>, LaunchError>
where
    S: ShutdownSignal + 'static,
{
    thread::Builder::new()
        .name(WATCHER_NAME.to_owned())
        .spawn(move || {
            let result = shutdown.wait();
            if let Err(error) = &result {
                error!(
                    target: PROCESS_TARGET,
                    error = %error,
                    "shutdown listener failed; stopping server"
                );
            }
            stopper.stop();
            result
        })
        .map_err(|source| LaunchError::Watcher { source })
}

fn join_watcher(
    watcher: thread::JoinHandle<Result<(), ShutdownError>>,
) -> Result<(), ShutdownError> {
    match watcher.join() {
        Ok(result) => result,
        Err(_) => {
            warn!(target: PROCESS_TARGET, "shutdown watcher panicked");
            Ok(())
        }
    }
}
