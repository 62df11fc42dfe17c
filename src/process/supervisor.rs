//! Generic lifecycle supervisor for one external process role
//!
//! Owns the `Stopped → Starting → Running → Stopping → Stopped` state
//! machine, crash detection and bounded restart. All mutating
//! operations are serialized through a per-supervisor async lock;
//! `status()` reads a snapshot cell and never touches child I/O.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, ChildStderr, Command};
use tokio::time::{sleep, timeout, Instant};

use crate::constants;
use crate::error::{ProcessError, Result};
use crate::process::launch::{resolve_binary, LaunchPlan, Readiness};
use crate::session::{Role, RoleState, SessionSnapshot};

/// Tunable timeouts, overridable in tests.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorOptions {
    /// Bound on graceful shutdown before SIGKILL escalation
    pub stop_timeout: Duration,
    /// Crash monitor poll interval
    pub monitor_interval: Duration,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            stop_timeout: constants::STOP_TIMEOUT,
            monitor_interval: constants::MONITOR_INTERVAL,
        }
    }
}

type StderrTail = Arc<Mutex<VecDeque<String>>>;

#[derive(Default)]
struct StateCell {
    state: RoleState,
    child: Option<Child>,
    pid: Option<u32>,
    started_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    restart_count: u32,
    /// Bumped on every start/stop; invalidates stale monitor tasks
    generation: u64,
    stderr_tail: Option<StderrTail>,
    plan: Option<LaunchPlan>,
}

struct Inner {
    role: Role,
    opts: SupervisorOptions,
    /// Serializes start/stop; a pending Stop waits for an in-flight
    /// Start and then wins.
    op_lock: tokio::sync::Mutex<()>,
    cell: Mutex<StateCell>,
}

/// Lifecycle manager for one role's external process.
#[derive(Clone)]
pub struct ProcessSupervisor {
    inner: Arc<Inner>,
}

impl ProcessSupervisor {
    pub fn new(role: Role) -> Self {
        Self::with_options(role, SupervisorOptions::default())
    }

    pub fn with_options(role: Role, opts: SupervisorOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                role,
                opts,
                op_lock: tokio::sync::Mutex::new(()),
                cell: Mutex::new(StateCell::default()),
            }),
        }
    }

    pub fn role(&self) -> Role {
        self.inner.role
    }

    /// Current session snapshot. Never blocks on process I/O.
    pub fn status(&self) -> SessionSnapshot {
        let cell = self.inner.cell.lock();
        snapshot_of(self.inner.role, &cell)
    }

    /// Start the role's process according to `plan`.
    ///
    /// Fails with `AlreadyRunning` unless the role is Stopped or
    /// Failed, and with `BinaryNotFound` before any state change if
    /// the executable cannot be resolved.
    pub async fn start(&self, plan: LaunchPlan) -> Result<SessionSnapshot> {
        let _op = self.inner.op_lock.lock().await;
        {
            let cell = self.inner.cell.lock();
            if cell.state.is_live() {
                return Err(ProcessError::AlreadyRunning(self.inner.role).into());
            }
        }
        let binary = resolve_binary(&plan.binary)?;
        self.launch(binary, plan, 0).await
    }

    /// Stop the role's process.
    ///
    /// A no-op returning the current snapshot when already Stopped;
    /// cleans up a Failed role; otherwise terminates gracefully with
    /// bounded escalation to SIGKILL.
    pub async fn stop(&self) -> Result<SessionSnapshot> {
        let _op = self.inner.op_lock.lock().await;
        let child = {
            let mut cell = self.inner.cell.lock();
            match cell.state {
                RoleState::Stopped => {
                    return Ok(snapshot_of(self.inner.role, &cell));
                }
                RoleState::Failed => {
                    cell.state = RoleState::Stopped;
                    cell.generation += 1;
                    cell.child = None;
                    cell.pid = None;
                    cell.started_at = None;
                    return Ok(snapshot_of(self.inner.role, &cell));
                }
                _ => {
                    cell.state = RoleState::Stopping;
                    cell.generation += 1;
                    cell.child.take()
                }
            }
        };

        if let Some(mut child) = child {
            if let Some(pid) = child.id() {
                graceful_terminate(pid).await;
            }
            match timeout(self.inner.opts.stop_timeout, child.wait()).await {
                Ok(_) => {}
                Err(_) => {
                    tracing::warn!(
                        role = %self.inner.role,
                        "process did not exit within {:?}, killing",
                        self.inner.opts.stop_timeout
                    );
                    let _ = child.kill().await;
                }
            }
        }

        let mut cell = self.inner.cell.lock();
        cell.state = RoleState::Stopped;
        cell.pid = None;
        cell.started_at = None;
        cell.last_error = None;
        cell.restart_count = 0;
        tracing::info!(role = %self.inner.role, "stopped");
        Ok(snapshot_of(self.inner.role, &cell))
    }

    /// Spawn the process and run the readiness probe.
    ///
    /// Caller must hold the operation lock.
    async fn launch(
        &self,
        binary: std::path::PathBuf,
        plan: LaunchPlan,
        restart_count: u32,
    ) -> Result<SessionSnapshot> {
        let role = self.inner.role;

        // restore the captured artifact so a restart never picks up a
        // config written after the session started
        if let Some(artifact) = &plan.artifact {
            if let Err(e) = artifact.write() {
                let reason = format!("artifact write failed: {e}");
                let mut cell = self.inner.cell.lock();
                cell.state = RoleState::Failed;
                cell.last_error = Some(reason.clone());
                return Err(ProcessError::StartFailed { role, reason }.into());
            }
        }

        let generation = {
            let mut cell = self.inner.cell.lock();
            cell.generation += 1;
            cell.state = RoleState::Starting;
            cell.last_error = None;
            cell.restart_count = restart_count;
            cell.plan = Some(plan.clone());
            cell.generation
        };

        tracing::info!(role = %role, binary = %binary.display(), "starting");
        let spawned = Command::new(&binary)
            .args(&plan.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                let reason = format!("spawn failed: {e}");
                let mut cell = self.inner.cell.lock();
                cell.state = RoleState::Failed;
                cell.last_error = Some(reason.clone());
                return Err(ProcessError::StartFailed { role, reason }.into());
            }
        };

        let pid = child.id();
        let tail = child.stderr.take().map(|stderr| spawn_stderr_drain(role, stderr));
        {
            let mut cell = self.inner.cell.lock();
            cell.child = Some(child);
            cell.pid = pid;
            cell.stderr_tail = tail;
        }

        if let Err(reason) = self.await_readiness(&plan.readiness).await {
            let mut cell = self.inner.cell.lock();
            let detail = match stderr_excerpt(cell.stderr_tail.as_ref()) {
                Some(excerpt) => format!("{reason}: {excerpt}"),
                None => reason,
            };
            cell.state = RoleState::Failed;
            cell.last_error = Some(detail.clone());
            if let Some(mut child) = cell.child.take() {
                // reap the dying process off the lock path
                tokio::spawn(async move {
                    let _ = child.kill().await;
                });
            }
            cell.pid = None;
            return Err(ProcessError::StartFailed { role, reason: detail }.into());
        }

        let snapshot = {
            let mut cell = self.inner.cell.lock();
            cell.state = RoleState::Running;
            cell.started_at = Some(Utc::now());
            snapshot_of(role, &cell)
        };
        tracing::info!(role = %role, pid = ?pid, "running");
        self.spawn_monitor(generation);
        Ok(snapshot)
    }

    /// Wait until the readiness probe passes, or return the failure
    /// reason.
    async fn await_readiness(&self, readiness: &Readiness) -> std::result::Result<(), String> {
        match *readiness {
            Readiness::ProcessAlive { grace } => {
                sleep(grace).await;
                self.check_exited()
            }
            Readiness::PortOpen { port, timeout: bound } => {
                let deadline = Instant::now() + bound;
                loop {
                    self.check_exited()?;
                    let attempt = timeout(
                        Duration::from_millis(500),
                        TcpStream::connect(("127.0.0.1", port)),
                    )
                    .await;
                    if matches!(attempt, Ok(Ok(_))) {
                        return Ok(());
                    }
                    if Instant::now() >= deadline {
                        return Err(format!("port {port} not reachable within {bound:?}"));
                    }
                    sleep(Duration::from_millis(250)).await;
                }
            }
        }
    }

    /// Error if the child has already exited.
    fn check_exited(&self) -> std::result::Result<(), String> {
        let mut cell = self.inner.cell.lock();
        match cell.child.as_mut().map(|c| c.try_wait()) {
            Some(Ok(Some(status))) => Err(format!("exited during startup ({})", describe_exit(status))),
            Some(Ok(None)) => Ok(()),
            Some(Err(e)) => Err(format!("wait failed: {e}")),
            None => Err("process handle missing".to_string()),
        }
    }

    /// Background crash monitor for one process generation.
    fn spawn_monitor(&self, generation: u64) {
        let this = self.clone();
        tokio::spawn(async move {
            this.monitor(generation).await;
        });
    }

    async fn monitor(self, generation: u64) {
        let role = self.inner.role;
        loop {
            sleep(self.inner.opts.monitor_interval).await;

            let crashed = {
                let mut cell = self.inner.cell.lock();
                if cell.generation != generation || cell.state != RoleState::Running {
                    return;
                }
                let status = match cell.child.as_mut().map(|c| c.try_wait()) {
                    Some(Ok(Some(status))) => status,
                    Some(Ok(None)) => continue,
                    Some(Err(e)) => {
                        tracing::warn!(role = %role, "monitor wait failed: {e}");
                        continue;
                    }
                    None => return,
                };
                let reason = match stderr_excerpt(cell.stderr_tail.as_ref()) {
                    Some(excerpt) => format!("{}: {excerpt}", describe_exit(status)),
                    None => describe_exit(status),
                };
                cell.state = RoleState::Failed;
                cell.last_error = Some(reason.clone());
                cell.child = None;
                cell.pid = None;
                tracing::error!(role = %role, "unexpected exit: {reason}");
                cell.plan.clone().map(|plan| (plan, cell.restart_count))
            };

            let Some((plan, attempts_done)) = crashed else { return };
            let Some(policy) = plan.restart else { return };
            self.auto_restart(plan, policy, attempts_done).await;
            return;
        }
    }

    /// Re-attempt start with bounded exponential backoff, settling in
    /// Failed once the retry budget is spent.
    async fn auto_restart(
        &self,
        plan: LaunchPlan,
        policy: crate::process::backoff::RestartPolicy,
        attempts_done: u32,
    ) {
        let role = self.inner.role;
        let mut attempt = attempts_done;
        while attempt < policy.max_retries {
            let delay = policy.delay_for(attempt);
            tracing::info!(role = %role, "restart attempt {} in {:?}", attempt + 1, delay);
            sleep(delay).await;

            let _op = self.inner.op_lock.lock().await;
            {
                let cell = self.inner.cell.lock();
                if cell.state != RoleState::Failed {
                    // operator intervened during the backoff
                    return;
                }
            }
            attempt += 1;
            let binary = match resolve_binary(&plan.binary) {
                Ok(binary) => binary,
                Err(e) => {
                    tracing::error!(role = %role, "restart aborted: {e}");
                    return;
                }
            };
            match self.launch(binary, plan.clone(), attempt).await {
                Ok(_) => return,
                Err(e) => {
                    tracing::warn!(role = %role, "restart attempt {attempt} failed: {e}");
                }
            }
        }
        tracing::error!(role = %role, "restart budget exhausted, settling in failed state");
    }
}

fn snapshot_of(role: Role, cell: &StateCell) -> SessionSnapshot {
    SessionSnapshot {
        role,
        state: cell.state,
        pid: cell.pid,
        started_at: cell.started_at,
        last_error: cell.last_error.clone(),
        restart_count: cell.restart_count,
    }
}

fn describe_exit(status: std::process::ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

/// Drain stderr in the background, keeping a bounded tail for
/// diagnostics.
fn spawn_stderr_drain(role: Role, stderr: ChildStderr) -> StderrTail {
    let tail: StderrTail = Arc::new(Mutex::new(VecDeque::new()));
    let sink = tail.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!(role = %role, "stderr: {line}");
            let mut sink = sink.lock();
            if sink.len() >= constants::STDERR_TAIL_LINES {
                sink.pop_front();
            }
            sink.push_back(line);
        }
    });
    tail
}

fn stderr_excerpt(tail: Option<&StderrTail>) -> Option<String> {
    let tail = tail?.lock();
    if tail.is_empty() {
        return None;
    }
    Some(tail.iter().cloned().collect::<Vec<_>>().join(" | "))
}

/// Ask the process to exit; `kill` sends SIGTERM by default.
async fn graceful_terminate(pid: u32) {
    match Command::new("kill").arg(pid.to_string()).status().await {
        Ok(status) if !status.success() => {
            tracing::debug!("kill {pid} exited with {status}");
        }
        Ok(_) => {}
        Err(e) => tracing::debug!("kill {pid} failed: {e}"),
    }
}
