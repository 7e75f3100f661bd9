//! Ordered record of what the doubles observed.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::event::ServerEventHandler;
use crate::protocol::Protocol;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    PreServe,
    ClientBegin,
    Process(usize),
    ClientEnd,
    /// A transport closed while `live` tasks were registered.
    Closed { side: &'static str, live: usize },
}

#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Event>>>);

impl Journal {
    pub fn record(&self, event: Event) {
        self.0.lock().expect("journal lock").push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().expect("journal lock").clone()
    }

    pub fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|event| predicate(event)).count()
    }
}

/// Event handler that writes every hook into a [`Journal`].
#[derive(Debug, Clone)]
pub struct EventHandlerProbe {
    journal: Journal,
}

impl EventHandlerProbe {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
        }
    }
}

impl ServerEventHandler for EventHandlerProbe {
    fn pre_serve(&self) {
        self.journal.record(Event::PreServe);
    }

    fn client_begin(&self, _input: &mut dyn Protocol, _output: &mut dyn Protocol) {
        self.journal.record(Event::ClientBegin);
    }

    fn client_end(&self, _input: &mut dyn Protocol, _output: &mut dyn Protocol) {
        self.journal.record(Event::ClientEnd);
    }
}

/// One-shot latch that blocked workers wait on.
#[derive(Debug, Clone, Default)]
pub struct Gate(Arc<(Mutex<bool>, Condvar)>);

impl Gate {
    pub fn open(&self) {
        let (lock, cvar) = &*self.0;
        *lock.lock().expect("gate lock") = true;
        cvar.notify_all();
    }

    pub fn wait(&self) {
        let (lock, cvar) = &*self.0;
        let guard = lock.lock().expect("gate lock");
        let _open = cvar
            .wait_while(guard, |open| !*open)
            .expect("gate wait");
    }

    /// Opens the gate from another thread after `delay`.
    pub fn open_after(&self, delay: Duration) -> std::thread::JoinHandle<()> {
        let gate = self.clone();
        std::thread::spawn(move || {
            std::thread::sleep(delay);
            gate.open();
        })
    }
}
