//! Transport doubles.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use super::journal::{Event, Journal};
use crate::error::TransportError;
use crate::registry::TaskRegistry;
use crate::transport::{ServerTransport, Transport, TransportFactory};

/// Connection end that never carries bytes.
///
/// `peek` answers with a fixed value and `close` records itself in the
/// journal, together with the registry size at that moment.
#[derive(Debug, Clone)]
pub struct ScriptedTransport {
    side: &'static str,
    journal: Journal,
    pending: bool,
    fail_close: bool,
    registry: Option<Arc<TaskRegistry>>,
    open: Arc<AtomicBool>,
}

impl ScriptedTransport {
    pub fn new(side: &'static str, journal: &Journal) -> Self {
        Self {
            side,
            journal: journal.clone(),
            pending: true,
            fail_close: false,
            registry: None,
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Makes `peek` report no pending input.
    pub fn idle(mut self) -> Self {
        self.pending = false;
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn observing(mut self, registry: &Arc<TaskRegistry>) -> Self {
        self.registry = Some(Arc::clone(registry));
        self
    }
}

impl Transport for ScriptedTransport {
    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, TransportError> {
        Ok(0)
    }

    fn write(&mut self, _buf: &[u8]) -> Result<(), TransportError> {
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn peek(&mut self) -> Result<bool, TransportError> {
        Ok(self.pending)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.open.store(false, Ordering::SeqCst);
        let live = self.registry.as_ref().map_or(0, |registry| registry.len());
        self.journal.record(Event::Closed {
            side: self.side,
            live,
        });
        if self.fail_close {
            return Err(io::Error::other(format!("{} close refused", self.side)).into());
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn try_clone(&self) -> Result<Box<dyn Transport>, TransportError> {
        Ok(Box::new(self.clone()))
    }
}

/// Factory handing out copies of a template transport, or failing.
#[derive(Debug, Clone)]
pub struct ScriptedTransportFactory {
    template: ScriptedTransport,
    fail: bool,
}

impl ScriptedTransportFactory {
    pub fn new(template: ScriptedTransport) -> Self {
        Self {
            template,
            fail: false,
        }
    }

    pub fn failing(template: ScriptedTransport) -> Self {
        Self {
            template,
            fail: true,
        }
    }
}

impl TransportFactory for ScriptedTransportFactory {
    fn transport(&self, _client: &dyn Transport) -> Result<Box<dyn Transport>, TransportError> {
        if self.fail {
            return Err(io::Error::other("wrapping refused").into());
        }
        Ok(Box::new(self.template.clone()))
    }
}

/// What the next `accept` call does.
#[derive(Debug)]
pub enum AcceptStep {
    Connection(ScriptedTransport),
    Fail(TransportError),
    Panic,
}

#[derive(Debug, Default)]
struct ListenState {
    steps: VecDeque<AcceptStep>,
    interrupted: bool,
    blocked: bool,
    fail_listen: bool,
    panic_on_interrupt: bool,
    listen_calls: usize,
    close_calls: usize,
}

/// Server transport that plays back [`AcceptStep`]s.
///
/// Once the script runs out, `accept` blocks until it is interrupted.
#[derive(Debug, Default)]
pub struct ScriptedServerTransport {
    state: Mutex<ListenState>,
    changed: Condvar,
}

impl ScriptedServerTransport {
    pub fn new(steps: impl IntoIterator<Item = AcceptStep>) -> Arc<Self> {
        let transport = Self::default();
        transport.lock().steps = steps.into_iter().collect();
        Arc::new(transport)
    }

    pub fn failing_listen() -> Arc<Self> {
        let transport = Self::default();
        transport.lock().fail_listen = true;
        Arc::new(transport)
    }

    /// Transport whose blocked `accept` panics instead of reporting the
    /// interruption.
    pub fn panicking_on_interrupt() -> Arc<Self> {
        let transport = Self::default();
        transport.lock().panic_on_interrupt = true;
        Arc::new(transport)
    }

    pub fn push(&self, step: AcceptStep) {
        self.lock().steps.push_back(step);
        self.changed.notify_all();
    }

    pub fn listen_calls(&self) -> usize {
        self.lock().listen_calls
    }

    pub fn close_calls(&self) -> usize {
        self.lock().close_calls
    }

    /// Waits until an `accept` call has exhausted the script and is blocked.
    pub fn wait_until_blocked(&self, timeout: Duration) -> bool {
        let guard = self.lock();
        let (guard, _) = self
            .changed
            .wait_timeout_while(guard, timeout, |state| !state.blocked)
            .expect("listen state wait");
        guard.blocked
    }

    fn lock(&self) -> MutexGuard<'_, ListenState> {
        self.state.lock().expect("listen state lock")
    }
}

impl ServerTransport for ScriptedServerTransport {
    fn listen(&self) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.listen_calls += 1;
        state.interrupted = false;
        if state.fail_listen {
            return Err(io::Error::from(io::ErrorKind::AddrInUse).into());
        }
        Ok(())
    }

    fn accept(&self) -> Result<Box<dyn Transport>, TransportError> {
        let mut state = self.lock();
        let step = loop {
            if state.interrupted {
                state.blocked = false;
                if state.panic_on_interrupt {
                    drop(state);
                    panic!("accept panicked after interrupt");
                }
                return Err(TransportError::Interrupted);
            }
            if let Some(step) = state.steps.pop_front() {
                break step;
            }
            state.blocked = true;
            self.changed.notify_all();
            state = self.changed.wait(state).expect("listen state wait");
        };
        state.blocked = false;
        drop(state);
        match step {
            AcceptStep::Connection(transport) => Ok(Box::new(transport)),
            AcceptStep::Fail(error) => Err(error),
            AcceptStep::Panic => panic!("scripted accept panic"),
        }
    }

    fn interrupt(&self) {
        self.lock().interrupted = true;
        self.changed.notify_all();
    }

    fn close(&self) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.close_calls += 1;
        state.interrupted = true;
        drop(state);
        self.changed.notify_all();
        Ok(())
    }
}
