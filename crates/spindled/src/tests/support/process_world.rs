//! Daemon process test world shared across BDD scenarios.

use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use spindle::{BinaryProtocol, Message, Protocol, SocketTransport};
use spindle_config::SocketEndpoint;

use crate::process::{LaunchError, ShutdownError, ShutdownSignal, run_daemon_with};
use crate::tests::support::{FailingConfigLoader, TestConfigLoader};

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(2);
pub const POLL_INTERVAL: Duration = Duration::from_millis(25);
const FRAME_LIMIT: usize = 4096;

pub type StepResult = Result<(), String>;

pub struct ProcessTestWorld {
    loader: TestConfigLoader,
    shutdown: TestShutdownSignal,
    handle: Option<thread::JoinHandle<Result<(), LaunchError>>>,
    result: Option<Result<(), LaunchError>>,
    client: Option<BinaryProtocol>,
    last_reply: Option<Message>,
    sequence: i32,
}

impl Default for ProcessTestWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTestWorld {
    pub fn new() -> Self {
        Self {
            loader: TestConfigLoader::new(),
            shutdown: TestShutdownSignal::new(),
            handle: None,
            result: None,
            client: None,
            last_reply: None,
            sequence: 0,
        }
    }

    pub fn start_background(&mut self) -> StepResult {
        if self.handle.is_some() {
            return Err("daemon already running".to_string());
        }
        let loader = self.loader.clone();
        let shutdown = self.shutdown.clone();
        self.handle = Some(thread::spawn(move || run_daemon_with(&loader, shutdown)));
        Ok(())
    }

    pub fn start_with_invalid_config(&mut self) -> StepResult {
        if self.result.is_some() {
            return Err("result already recorded".to_string());
        }
        self.result = Some(run_daemon_with(
            &FailingConfigLoader,
            TestShutdownSignal::new(),
        ));
        Ok(())
    }

    /// Connects a client, retrying until the daemon is listening.
    pub fn connect(&mut self) -> StepResult {
        let endpoint = self.endpoint();
        let deadline = Instant::now() + WAIT_TIMEOUT;
        loop {
            match SocketTransport::connect(&endpoint) {
                Ok(transport) => {
                    self.client = Some(BinaryProtocol::new(Box::new(transport), FRAME_LIMIT));
                    return Ok(());
                }
                Err(error) if Instant::now() >= deadline => {
                    return Err(format!("daemon never accepted a connection: {error}"));
                }
                Err(_) => thread::sleep(POLL_INTERVAL),
            }
        }
    }

    pub fn call(&mut self, name: &str, payload: &str) -> StepResult {
        self.sequence += 1;
        let call = Message::call(name, self.sequence, payload.as_bytes());
        let client = self
            .client
            .as_mut()
            .ok_or_else(|| "no client connected".to_string())?;
        client
            .write_message(&call)
            .map_err(|error| error.to_string())?;
        let reply = client.read_message().map_err(|error| error.to_string())?;
        self.last_reply = Some(reply);
        Ok(())
    }

    pub fn last_reply(&self) -> Option<&Message> {
        self.last_reply.as_ref()
    }

    pub fn trigger_shutdown(&self) {
        self.shutdown.trigger();
    }

    pub fn join_background(&mut self) -> StepResult {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| "daemon not running".to_string())?;
        match handle.join() {
            Ok(result) => {
                self.result = Some(result);
                Ok(())
            }
            Err(_) => Err("daemon thread panicked".to_string()),
        }
    }

    /// True while the daemon thread has not returned.
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn socket_exists(&self) -> bool {
        self.loader.socket_path().exists()
    }

    pub fn last_result(&self) -> Option<&Result<(), LaunchError>> {
        self.result.as_ref()
    }

    fn endpoint(&self) -> SocketEndpoint {
        SocketEndpoint::unix(self.loader.socket_path())
    }
}

impl Drop for ProcessTestWorld {
    fn drop(&mut self) {
        self.client = None;
        self.shutdown.trigger();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[derive(Clone)]
pub struct TestShutdownSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl TestShutdownSignal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    pub fn trigger(&self) {
        let (lock, cvar) = &*self.inner;
        let mut triggered = lock.lock().expect("shutdown mutex poisoned");
        *triggered = true;
        cvar.notify_all();
    }
}

impl ShutdownSignal for TestShutdownSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        let (lock, cvar) = &*self.inner;
        let mut triggered = lock.lock().expect("shutdown mutex poisoned");
        while !*triggered {
            triggered = cvar
                .wait(triggered)
                .expect("shutdown mutex poisoned during wait");
        }
        Ok(())
    }

    fn cancel(&self) {
        self.trigger();
    }
}
