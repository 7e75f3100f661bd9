//! The spindle daemon.
//!
//! `spindled` loads its [`spindle_config::Config`], installs structured
//! telemetry, prepares the listening socket, and serves the
//! [`EchoService`] on a [`spindle::ThreadedServer`]. A termination signal
//! stops the accept loop; the daemon exits once every open connection has
//! finished.

mod bootstrap;
mod events;
mod process;
mod report;
mod service;
mod telemetry;

pub use bootstrap::{ConfigLoader, StaticConfigLoader, SystemConfigLoader};
pub use events::StructuredEventHandler;
pub use process::{
    LaunchError, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_daemon, run_daemon_with,
};
pub use report::write_error_chain;
pub use service::EchoService;
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
