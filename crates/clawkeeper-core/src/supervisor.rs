//! Owns the long-running gateway child and the stop, reinstall, relaunch cycle.

use std::io;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

use crate::commands::{redact, GatewayCli, GATEWAY_INSTALL, GATEWAY_RUN, GATEWAY_STOP};
use crate::health::HealthProbe;
use crate::restart_flag::RestartFlag;
use crate::settings::Settings;

/// A spawned `gateway run` process.
#[async_trait]
pub trait GatewayProcess: Send {
    fn pid(&self) -> Option<u32>;
    /// Ask the process to exit. Does not wait.
    fn terminate(&mut self) -> io::Result<()>;
    /// Resolves with the exit code once the process is gone.
    async fn wait(&mut self) -> io::Result<Option<i32>>;
}

pub trait GatewayLauncher: Send + Sync {
    fn launch(&self) -> io::Result<Box<dyn GatewayProcess>>;
}

/// Spawns the real gateway binary and forwards its output into the log.
pub struct ChildLauncher {
    bin: String,
    env: Vec<(String, String)>,
}

impl ChildLauncher {
    pub fn new(settings: &Settings) -> Self {
        Self {
            bin: settings.gateway_bin.clone(),
            env: settings.gateway_env(),
        }
    }
}

impl GatewayLauncher for ChildLauncher {
    fn launch(&self) -> io::Result<Box<dyn GatewayProcess>> {
        let mut child = Command::new(&self.bin)
            .args(GATEWAY_RUN)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output(stdout, false));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output(stderr, true));
        }
        Ok(Box::new(ChildProcess { child }))
    }
}

async fn forward_output<R>(reader: R, is_stderr: bool)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = redact(&line);
        if is_stderr {
            tracing::warn!(target: "gateway", "{line}");
        } else {
            tracing::info!(target: "gateway", "{line}");
        }
    }
}

struct ChildProcess {
    child: Child,
}

#[async_trait]
impl GatewayProcess for ChildProcess {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    fn terminate(&mut self) -> io::Result<()> {
        match self.child.id() {
            Some(pid) => send_terminate(&mut self.child, pid),
            // Already reaped.
            None => Ok(()),
        }
    }

    async fn wait(&mut self) -> io::Result<Option<i32>> {
        Ok(self.child.wait().await?.code())
    }
}

#[cfg(unix)]
fn send_terminate(_child: &mut Child, pid: u32) -> io::Result<()> {
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn send_terminate(child: &mut Child, _pid: u32) -> io::Result<()> {
    child.start_kill()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Stopped,
    Running,
    Restarting,
}

struct ManagedChild {
    generation: u64,
    pid: Option<u32>,
    terminate: oneshot::Sender<()>,
}

type ChildSlot = Arc<Mutex<Option<ManagedChild>>>;

pub struct ProcessSupervisor {
    settings: Settings,
    cli: Arc<dyn GatewayCli>,
    launcher: Arc<dyn GatewayLauncher>,
    probe: Arc<dyn HealthProbe>,
    restart_flag: Arc<RestartFlag>,
    child: ChildSlot,
    generation: AtomicU64,
    pending_restarts: AtomicUsize,
}

impl ProcessSupervisor {
    pub fn new(
        settings: Settings,
        cli: Arc<dyn GatewayCli>,
        launcher: Arc<dyn GatewayLauncher>,
        probe: Arc<dyn HealthProbe>,
        restart_flag: Arc<RestartFlag>,
    ) -> Self {
        Self {
            settings,
            cli,
            launcher,
            probe,
            restart_flag,
            child: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
            pending_restarts: AtomicUsize::new(0),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.probe.is_running().await
    }

    /// Pid of the child this supervisor spawned, if it is still alive.
    pub async fn managed_pid(&self) -> Option<u32> {
        self.child.lock().await.as_ref().and_then(|c| c.pid)
    }

    pub async fn has_managed_child(&self) -> bool {
        self.child.lock().await.is_some()
    }

    pub async fn state(&self) -> SupervisorState {
        if self.pending_restarts.load(Ordering::SeqCst) > 0 {
            SupervisorState::Restarting
        } else if self.probe.is_running().await {
            SupervisorState::Running
        } else {
            SupervisorState::Stopped
        }
    }

    /// Launch the gateway unless onboarding is incomplete or something
    /// already answers on the gateway port.
    pub async fn start(&self) {
        if !self.settings.is_onboarded() {
            tracing::info!("Not onboarded yet, gateway will start after setup");
            return;
        }
        if self.probe.is_running().await {
            tracing::info!(addr = %self.settings.gateway_addr(), "Gateway already running, skipping start");
            return;
        }
        self.launch().await;
    }

    async fn launch(&self) {
        let mut slot = self.child.lock().await;
        if slot.is_some() {
            tracing::info!("Managed gateway process still alive, skipping launch");
            return;
        }

        tracing::info!(bin = %self.settings.gateway_bin, "Starting gateway");
        let process = match self.launcher.launch() {
            Ok(process) => process,
            Err(e) => {
                tracing::error!(error = %e, "Failed to spawn gateway");
                return;
            }
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let pid = process.pid();
        let (terminate, terminate_rx) = oneshot::channel();
        *slot = Some(ManagedChild {
            generation,
            pid,
            terminate,
        });
        tracing::info!(pid = ?pid, "Gateway process spawned");
        tokio::spawn(watch_child(
            process,
            terminate_rx,
            generation,
            Arc::clone(&self.child),
        ));
    }

    /// Stop, reinstall and relaunch the gateway so it sees a fresh environment.
    ///
    /// `reload_env` runs before anything else. The stop and reinstall steps
    /// finish before this returns; the relaunch runs on the returned task once
    /// the old gateway releases its port or the wait window closes.
    pub async fn restart<F>(self: &Arc<Self>, reload_env: F) -> JoinHandle<()>
    where
        F: FnOnce() -> bool,
    {
        self.pending_restarts.fetch_add(1, Ordering::SeqCst);
        let changed = reload_env();
        tracing::info!(env_changed = changed, "Restarting gateway");

        let owned = self.child.lock().await.take();
        match owned {
            Some(child) => {
                tracing::info!(pid = ?child.pid, "Stopping managed gateway process");
                if child.terminate.send(()).is_err() {
                    tracing::warn!("Managed gateway already exited, falling back to gateway stop");
                    self.cli.run(GATEWAY_STOP).await;
                }
            }
            None => {
                self.cli.run(GATEWAY_STOP).await;
            }
        }

        let install = self.cli.run(GATEWAY_INSTALL).await;
        if !install.ok {
            tracing::warn!("Gateway reinstall failed, relaunching anyway");
        }
        self.restart_flag.clear();

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.wait_for_port_release().await;
            this.pending_restarts.fetch_sub(1, Ordering::SeqCst);
            this.start().await;
        })
    }

    async fn wait_for_port_release(&self) {
        let deadline = Instant::now() + self.settings.restart_wait;
        while Instant::now() < deadline {
            if !self.probe.is_running().await {
                return;
            }
            sleep(self.settings.restart_poll_interval).await;
        }
        tracing::warn!(
            waited = ?self.settings.restart_wait,
            "Gateway port still busy after restart window"
        );
    }

    /// Stop the gateway on supervisor exit.
    pub async fn shutdown(&self) {
        tracing::info!("Stopping gateway before exit");
        let out = self.cli.run(GATEWAY_STOP).await;
        if !out.ok {
            tracing::warn!("gateway stop failed: {}", out.summary());
        }
    }
}

async fn watch_child(
    mut process: Box<dyn GatewayProcess>,
    mut terminate_rx: oneshot::Receiver<()>,
    generation: u64,
    slot: ChildSlot,
) {
    let pid = process.pid();
    let status = tokio::select! {
        status = process.wait() => status,
        request = &mut terminate_rx => {
            if request.is_ok() {
                if let Err(e) = process.terminate() {
                    tracing::warn!(pid = ?pid, error = %e, "Failed to signal gateway");
                }
            }
            process.wait().await
        }
    };

    match status {
        Ok(code) => tracing::info!(pid = ?pid, code = ?code, "Gateway exited"),
        Err(e) => tracing::warn!(pid = ?pid, error = %e, "Lost track of gateway process"),
    }

    let mut guard = slot.lock().await;
    if guard.as_ref().is_some_and(|c| c.generation == generation) {
        *guard = None;
    }
}
