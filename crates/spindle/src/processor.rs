//! Request dispatch contract.

use std::sync::Arc;

use crate::error::Error;
use crate::protocol::Protocol;

/// Handles one request/response cycle on a connection.
///
/// The server shares a single processor across every connection task, so it
/// must be `Send + Sync`.
pub trait Processor: Send + Sync {
    /// Reads one request from `input` and answers it on `output`.
    ///
    /// Returning `Ok(false)` ends the connection cleanly.
    fn process(&self, input: &mut dyn Protocol, output: &mut dyn Protocol) -> Result<bool, Error>;
}

impl<P> Processor for Arc<P>
where
    P: Processor + ?Sized,
{
    fn process(&self, input: &mut dyn Protocol, output: &mut dyn Protocol) -> Result<bool, Error> {
        (**self).process(input, output)
    }
}

impl<P> Processor for Box<P>
where
    P: Processor + ?Sized,
{
    fn process(&self, input: &mut dyn Protocol, output: &mut dyn Protocol) -> Result<bool, Error> {
        (**self).process(input, output)
    }
}
