//! Doubles shared by the server and connection task suites.

mod journal;
mod logs;
mod processor;
mod transport;

pub use journal::{Event, EventHandlerProbe, Journal};
pub use logs::LogCapture;
pub use processor::{GatedProcessor, ScriptedProcessor, Step};
pub use transport::{
    AcceptStep, ScriptedServerTransport, ScriptedTransport, ScriptedTransportFactory,
};

pub const WAIT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(2);
