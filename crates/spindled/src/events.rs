//! Lifecycle logging for served connections.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use spindle::{Protocol, ServerEventHandler};
use tracing::{debug, info};

const EVENTS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::events");

/// Event handler that records server lifecycle events with `tracing` and
/// keeps connection counters.
#[derive(Debug, Default)]
pub struct StructuredEventHandler {
    opened: AtomicU64,
    active: AtomicUsize,
}

impl StructuredEventHandler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions started since the daemon began serving.
    #[must_use]
    pub fn sessions_opened(&self) -> u64 {
        self.opened.load(Ordering::SeqCst)
    }

    /// Sessions currently between `client_begin` and `client_end`.
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

impl ServerEventHandler for StructuredEventHandler {
    fn pre_serve(&self) {
        info!(
            target: EVENTS_TARGET,
            event = "pre_serve",
            "daemon accepting connections"
        );
    }

    fn client_begin(&self, _input: &mut dyn Protocol, _output: &mut dyn Protocol) {
        let session = self.opened.fetch_add(1, Ordering::SeqCst) + 1;
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            target: EVENTS_TARGET,
            event = "client_begin",
            session,
            active,
            "client session started"
        );
    }

    fn client_end(&self, _input: &mut dyn Protocol, _output: &mut dyn Protocol) {
        let active = self
            .active
            .fetch_sub(1, Ordering::SeqCst)
            .saturating_sub(1);
        debug!(
            target: EVENTS_TARGET,
            event = "client_end",
            active,
            "client session ended"
        );
    }
}
