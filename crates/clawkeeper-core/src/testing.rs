//! In-process stand-ins for the gateway binary and its port.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::commands::{CommandOutput, GatewayCli};
use crate::health::HealthProbe;
use crate::supervisor::{GatewayLauncher, GatewayProcess};

/// Shared, ordered record of what the fakes were asked to do.
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn events(log: &EventLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

fn record(log: &Option<EventLog>, event: String) {
    if let Some(log) = log {
        log.lock().unwrap().push(event);
    }
}

type RunHook = Box<dyn Fn(&[&str]) + Send + Sync>;

/// Records every CLI invocation and answers with a fixed outcome.
pub struct RecordingCli {
    calls: Mutex<Vec<String>>,
    fail: bool,
    log: Option<EventLog>,
    hook: Mutex<Option<RunHook>>,
}

impl RecordingCli {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: false,
            log: None,
            hook: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Run `hook` on every invocation, before the result is returned.
    pub fn on_run(&self, hook: impl Fn(&[&str]) + Send + Sync + 'static) {
        *self.hook.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl Default for RecordingCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GatewayCli for RecordingCli {
    async fn run(&self, args: &[&str]) -> CommandOutput {
        let line = args.join(" ");
        self.calls.lock().unwrap().push(line.clone());
        record(&self.log, format!("cli {line}"));
        if let Some(hook) = self.hook.lock().unwrap().as_ref() {
            hook(args);
        }
        if self.fail {
            CommandOutput::failure("simulated failure")
        } else {
            CommandOutput::success("")
        }
    }
}

/// Answers from a script, then a fallback that tests may flip.
pub struct ScriptedProbe {
    script: Mutex<VecDeque<bool>>,
    fallback: AtomicBool,
}

impl ScriptedProbe {
    pub fn always(running: bool) -> Self {
        Self::scripted([], running)
    }

    pub fn scripted(script: impl IntoIterator<Item = bool>, then: bool) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback: AtomicBool::new(then),
        }
    }

    pub fn set(&self, running: bool) {
        self.fallback.store(running, Ordering::SeqCst);
    }
}

#[async_trait]
impl HealthProbe for ScriptedProbe {
    async fn is_running(&self) -> bool {
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.load(Ordering::SeqCst))
    }
}

/// Test-side view of a fake gateway process.
#[derive(Clone)]
pub struct FakeHandle {
    terminated: Arc<AtomicBool>,
    exited: Arc<AtomicBool>,
    exit: Arc<Notify>,
}

impl FakeHandle {
    /// Make the process exit on its own.
    pub fn crash(&self) {
        self.exited.store(true, Ordering::SeqCst);
        self.exit.notify_one();
    }

    pub fn was_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }
}

struct FakeProcess {
    pid: u32,
    handle: FakeHandle,
    log: Option<EventLog>,
}

#[async_trait]
impl GatewayProcess for FakeProcess {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn terminate(&mut self) -> io::Result<()> {
        record(&self.log, "terminate".into());
        self.handle.terminated.store(true, Ordering::SeqCst);
        self.handle.exit.notify_one();
        Ok(())
    }

    async fn wait(&mut self) -> io::Result<Option<i32>> {
        loop {
            if self.handle.was_terminated() || self.handle.exited.load(Ordering::SeqCst) {
                return Ok(Some(0));
            }
            self.handle.exit.notified().await;
        }
    }
}

/// Hands out fake processes with pids 1001, 1002, ...
pub struct FakeLauncher {
    launches: AtomicUsize,
    fail_next: AtomicBool,
    handles: Mutex<Vec<FakeHandle>>,
    log: Option<EventLog>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self {
            launches: AtomicUsize::new(0),
            fail_next: AtomicBool::new(false),
            handles: Mutex::new(Vec::new()),
            log: None,
        }
    }

    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn handles(&self) -> Vec<FakeHandle> {
        self.handles.lock().unwrap().clone()
    }
}

impl Default for FakeLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayLauncher for FakeLauncher {
    fn launch(&self) -> io::Result<Box<dyn GatewayProcess>> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no gateway binary"));
        }
        let n = self.launches.fetch_add(1, Ordering::SeqCst) + 1;
        record(&self.log, "launch".into());
        let handle = FakeHandle {
            terminated: Arc::new(AtomicBool::new(false)),
            exited: Arc::new(AtomicBool::new(false)),
            exit: Arc::new(Notify::new()),
        };
        self.handles.lock().unwrap().push(handle.clone());
        Ok(Box::new(FakeProcess {
            pid: 1000 + n as u32,
            handle,
            log: self.log.clone(),
        }))
    }
}
