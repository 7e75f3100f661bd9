//! Resources held while an accepted connection is being wrapped.

use tracing::debug;

use super::SERVER_TARGET;
use crate::transport::Transport;

/// Transports built so far for one accepted connection.
///
/// Each slot is filled as soon as its transport exists. On failure
/// [`PendingConnection::close_all`] closes whatever was built; on success the
/// raw client handle is simply dropped, which leaves the wrapped handles
/// connected.
#[derive(Default)]
pub(super) struct PendingConnection {
    pub(super) client: Option<Box<dyn Transport>>,
    pub(super) input: Option<Box<dyn Transport>>,
    pub(super) output: Option<Box<dyn Transport>>,
}

impl PendingConnection {
    /// Hands over both wrapped transports, or neither.
    pub(super) fn take_wrapped(&mut self) -> Option<(Box<dyn Transport>, Box<dyn Transport>)> {
        match (self.input.take(), self.output.take()) {
            (Some(input), Some(output)) => Some((input, output)),
            (input, output) => {
                self.input = input;
                self.output = output;
                None
            }
        }
    }

    pub(super) fn close_all(&mut self) {
        let slots = [
            ("input", self.input.take()),
            ("output", self.output.take()),
            ("client", self.client.take()),
        ];
        for (side, transport) in slots {
            let Some(mut transport) = transport else {
                continue;
            };
            if let Err(error) = transport.close() {
                debug!(
                    target: SERVER_TARGET,
                    side,
                    error = %error,
                    "failed to close partially built connection"
                );
            }
        }
    }
}
