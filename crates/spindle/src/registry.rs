//! Registry of live connection tasks.
//!
//! The server registers a task before starting its worker. The worker
//! releases its [`TaskTicket`] as the very last step of teardown, which wakes
//! anyone waiting for the registry to drain.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Identifier of a registered connection task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "task-{}", self.0)
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    live: BTreeSet<TaskId>,
    next_id: u64,
}

/// Set of started-but-unfinished tasks, guarded by a mutex and a condition
/// variable that signals when the set becomes empty.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    state: Mutex<RegistryState>,
    drained: Condvar,
}

impl TaskRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new task and returns the ticket that releases it.
    #[must_use = "dropping the ticket deregisters the task immediately"]
    pub fn register(self: &Arc<Self>) -> TaskTicket {
        let mut state = self.lock();
        let id = TaskId(state.next_id);
        state.next_id += 1;
        state.live.insert(id);
        TaskTicket {
            registry: Arc::clone(self),
            id,
            released: false,
        }
    }

    /// Number of live tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().live.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().live.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: TaskId) -> bool {
        self.lock().live.contains(&id)
    }

    /// Snapshot of live task ids in registration order.
    #[must_use]
    pub fn live_tasks(&self) -> Vec<TaskId> {
        self.lock().live.iter().copied().collect()
    }

    /// Blocks until no tasks remain.
    pub fn wait_until_drained(&self) {
        let state = self.lock();
        let _drained = self
            .drained
            .wait_while(state, |state| !state.live.is_empty())
            .unwrap_or_else(|poison| poison.into_inner());
    }

    /// Blocks until no tasks remain or `timeout` elapses.
    ///
    /// Returns `true` when the registry drained in time.
    pub fn wait_until_drained_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        while !state.live.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            state = self
                .drained
                .wait_timeout(state, remaining)
                .unwrap_or_else(|poison| poison.into_inner())
                .0;
        }
        true
    }

    fn release(&self, id: TaskId) {
        let mut state = self.lock();
        if state.live.remove(&id) && state.live.is_empty() {
            self.drained.notify_all();
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

/// Proof of registration held by a running task.
///
/// Call [`TaskTicket::complete`] when the task has finished. If the ticket is
/// dropped first, for instance because the worker never started, the task is
/// deregistered then.
#[derive(Debug)]
pub struct TaskTicket {
    registry: Arc<TaskRegistry>,
    id: TaskId,
    released: bool,
}

impl TaskTicket {
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Deregisters the task, waking drain waiters if it was the last one.
    pub fn complete(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.registry.release(self.id);
        }
    }
}

impl Drop for TaskTicket {
    fn drop(&mut self) {
        self.release();
    }
}
