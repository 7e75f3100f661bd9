//! Processor doubles.

use std::collections::VecDeque;
use std::io;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use super::journal::{Event, Gate, Journal};
use crate::error::{Error, TransportError};
use crate::processor::Processor;
use crate::protocol::Protocol;

/// Outcome of one scripted `process` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Finish,
    TransportFailure,
    ApplicationFailure,
    Panic,
}

/// Processor that plays back a fixed list of outcomes, then finishes.
#[derive(Debug)]
pub struct ScriptedProcessor {
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
    journal: Journal,
}

impl ScriptedProcessor {
    pub fn new(journal: &Journal, steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            calls: AtomicUsize::new(0),
            journal: journal.clone(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Processor for ScriptedProcessor {
    fn process(&self, _input: &mut dyn Protocol, _output: &mut dyn Protocol) -> Result<bool, Error> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.journal.record(Event::Process(call));
        let step = self
            .steps
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or(Step::Finish);
        match step {
            Step::Continue => Ok(true),
            Step::Finish => Ok(false),
            Step::TransportFailure => Err(TransportError::from(io::Error::from(
                io::ErrorKind::ConnectionReset,
            ))
            .into()),
            Step::ApplicationFailure => Err(Error::application("scripted rejection")),
            Step::Panic => panic!("scripted processor panic"),
        }
    }
}

/// Processor whose calls block until its [`Gate`] opens.
#[derive(Debug, Default)]
pub struct GatedProcessor {
    gate: Gate,
    entered: AtomicUsize,
}

impl GatedProcessor {
    pub fn gate(&self) -> Gate {
        self.gate.clone()
    }

    /// Polls until `count` calls are blocked on the gate.
    pub fn wait_for_entered(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.entered.load(Ordering::SeqCst) >= count {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }
}

impl Processor for GatedProcessor {
    fn process(&self, _input: &mut dyn Protocol, _output: &mut dyn Protocol) -> Result<bool, Error> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        self.gate.wait();
        Ok(false)
    }
}
