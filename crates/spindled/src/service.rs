//! Demonstration service answered by the daemon.

use spindle::{Error, Message, MessageKind, Processor, Protocol};
use tracing::debug;

const SERVICE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::service");

/// Processor implementing the `echo`, `ping`, and `goodbye` calls.
///
/// Unknown calls get an exception reply and the session carries on. One-way
/// messages are executed but never answered. Replies and exceptions sent by
/// a client are protocol misuse and end the session.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoService;

impl EchoService {
    fn respond(call: &Message) -> (Message, bool) {
        match call.name.as_str() {
            "echo" => (call.reply(call.payload.clone()), true),
            "ping" => (call.reply(Vec::new()), true),
            "goodbye" => (call.reply(Vec::new()), false),
            other => (call.exception(format!("unknown method '{other}'")), true),
        }
    }
}

impl Processor for EchoService {
    fn process(&self, input: &mut dyn Protocol, output: &mut dyn Protocol) -> Result<bool, Error> {
        let message = input.read_message()?;
        debug!(
            target: SERVICE_TARGET,
            name = %message.name,
            sequence = message.sequence,
            kind = ?message.kind,
            "request received"
        );
        match message.kind {
            MessageKind::Call => {
                let (response, keep_going) = Self::respond(&message);
                output.write_message(&response)?;
                Ok(keep_going)
            }
            MessageKind::Oneway => Ok(Self::respond(&message).1),
            MessageKind::Reply | MessageKind::Exception => Err(Error::application(format!(
                "client sent a {:?} message for '{}'",
                message.kind, message.name
            ))),
        }
    }
}
