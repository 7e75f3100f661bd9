//! Lifecycle hooks observed by the server.

use std::sync::Arc;

use crate::protocol::Protocol;

/// Observer notified about server and connection lifecycle events.
///
/// Every hook defaults to doing nothing. Hooks are fire-and-forget: the
/// server ignores anything they do and does not catch their panics.
pub trait ServerEventHandler: Send + Sync {
    /// Invoked once per `serve` call, after listening succeeds and before the
    /// first accept.
    fn pre_serve(&self) {}

    /// Invoked on the connection's worker before the first request.
    fn client_begin(&self, _input: &mut dyn Protocol, _output: &mut dyn Protocol) {}

    /// Invoked on the connection's worker after the last request, before the
    /// transports are closed.
    fn client_end(&self, _input: &mut dyn Protocol, _output: &mut dyn Protocol) {}
}

impl<T> ServerEventHandler for Arc<T>
where
    T: ServerEventHandler + ?Sized,
{
    fn pre_serve(&self) {
        (**self).pre_serve();
    }

    fn client_begin(&self, input: &mut dyn Protocol, output: &mut dyn Protocol) {
        (**self).client_begin(input, output);
    }

    fn client_end(&self, input: &mut dyn Protocol, output: &mut dyn Protocol) {
        (**self).client_end(input, output);
    }
}

/// Handler used when none is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventHandler;

impl ServerEventHandler for NoopEventHandler {}
