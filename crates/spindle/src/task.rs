//! Per-connection worker body.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::error::{Error, FailureClass};
use crate::event::ServerEventHandler;
use crate::processor::Processor;
use crate::protocol::Protocol;
use crate::registry::{TaskId, TaskTicket};

const TASK_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::task");

/// Owns one accepted connection from its first request to deregistration.
///
/// [`ConnectionTask::run`] never propagates a failure: every processing
/// error is logged and the task always tears down and releases its ticket.
pub struct ConnectionTask {
    ticket: TaskTicket,
    processor: Arc<dyn Processor>,
    event_handler: Arc<dyn ServerEventHandler>,
    input: Box<dyn Protocol>,
    output: Box<dyn Protocol>,
}

impl ConnectionTask {
    /// Task for one wrapped connection, holding its registry `ticket`.
    #[must_use]
    pub fn new(
        ticket: TaskTicket,
        processor: Arc<dyn Processor>,
        event_handler: Arc<dyn ServerEventHandler>,
        input: Box<dyn Protocol>,
        output: Box<dyn Protocol>,
    ) -> Self {
        Self {
            ticket,
            processor,
            event_handler,
            input,
            output,
        }
    }

    #[must_use]
    pub fn id(&self) -> TaskId {
        self.ticket.id()
    }

    /// Serves the connection until it ends, then tears it down.
    pub fn run(self) {
        let Self {
            ticket,
            processor,
            event_handler,
            mut input,
            mut output,
        } = self;
        let task_id = ticket.id();

        event_handler.client_begin(input.as_mut(), output.as_mut());

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            serve_requests(processor.as_ref(), input.as_mut(), output.as_mut())
        }))
        .unwrap_or_else(|payload| Err(Error::from_panic(payload)));
        match outcome {
            Ok(served) => debug!(
                target: TASK_TARGET,
                %task_id,
                served,
                "client session ended"
            ),
            Err(error) => log_session_failure(task_id, &error),
        }

        event_handler.client_end(input.as_mut(), output.as_mut());

        if let Err(error) = input.transport().close() {
            warn!(
                target: TASK_TARGET,
                %task_id,
                error = %error,
                "input transport close failed"
            );
        }
        if let Err(error) = output.transport().close() {
            warn!(
                target: TASK_TARGET,
                %task_id,
                error = %error,
                "output transport close failed"
            );
        }

        ticket.complete();
    }
}

/// Runs the request loop and returns how many `process` calls were made.
fn serve_requests(
    processor: &dyn Processor,
    input: &mut dyn Protocol,
    output: &mut dyn Protocol,
) -> Result<u64, Error> {
    let mut served = 0_u64;
    loop {
        served += 1;
        if !processor.process(input, output)? {
            return Ok(served);
        }
        if !input.transport().peek()? {
            return Ok(served);
        }
    }
}

fn log_session_failure(task_id: TaskId, error: &Error) {
    match error.class() {
        FailureClass::Transport { .. } => warn!(
            target: TASK_TARGET,
            %task_id,
            error = %error,
            "client connection died"
        ),
        FailureClass::Framework => warn!(
            target: TASK_TARGET,
            %task_id,
            error = %error,
            "client request failed"
        ),
        FailureClass::Unknown => error!(
            target: TASK_TARGET,
            %task_id,
            error = %error,
            "client task hit an unrecognised failure"
        ),
    }
}
