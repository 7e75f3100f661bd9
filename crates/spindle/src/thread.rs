//! Worker thread creation.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

/// Unit of work handed to a [`ThreadFactory`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Starts independently scheduled workers.
pub trait ThreadFactory: Send + Sync {
    /// Runs `job` on a new worker without waiting for it.
    ///
    /// On failure the job is dropped without running.
    fn spawn(&self, job: Job) -> io::Result<()>;
}

/// Spawns named OS threads with [`std::thread::Builder`].
#[derive(Debug)]
pub struct StdThreadFactory {
    name_prefix: String,
    stack_size: Option<usize>,
    counter: AtomicU64,
}

impl StdThreadFactory {
    /// Factory naming its threads `<name_prefix>-<n>`.
    #[must_use]
    pub fn new(name_prefix: impl Into<String>) -> Self {
        Self {
            name_prefix: name_prefix.into(),
            stack_size: None,
            counter: AtomicU64::new(0),
        }
    }

    /// Overrides the platform default stack size.
    #[must_use]
    pub fn with_stack_size(mut self, stack_size: Option<usize>) -> Self {
        self.stack_size = stack_size;
        self
    }

    fn next_name(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}-{n}", self.name_prefix)
    }
}

impl Default for StdThreadFactory {
    fn default() -> Self {
        Self::new("spindle-worker")
    }
}

impl ThreadFactory for StdThreadFactory {
    fn spawn(&self, job: Job) -> io::Result<()> {
        let mut builder = thread::Builder::new().name(self.next_name());
        if let Some(stack_size) = self.stack_size {
            builder = builder.stack_size(stack_size);
        }
        builder.spawn(job).map(drop)
    }
}
