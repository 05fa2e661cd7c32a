//! Lifecycle owner for the single agent session.
//!
//! `SessionController` holds the only handle to the child process. The
//! check-and-spawn in `start()` runs under one lock, so concurrent starts
//! can never produce two children.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use portable_pty::{Child, ChildKiller, ExitStatus, MasterPty};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::dispatch::CommandDispatcher;
use crate::error::Result;
use crate::models::{
    ExitRecord, SessionHandle, SessionState, SessionStatus, StartOptions, StopOutcome, Variant,
};
use crate::pty::{
    INTERRUPT, LocalInputRelay, LocalTerminal, OUTPUT_CHANNEL_CAPACITY, OutputTail, PtyBridge,
    PtyInput, SpawnSpec, SpawnedAgent, signal, spawn_agent, spawn_output_reader,
};

/// Time the agent gets to honour Ctrl+C before it is terminated
pub const STOP_GRACE: Duration = Duration::from_millis(250);

/// Pause between stop and start on restart. Not a guaranteed drain.
pub const RESTART_SETTLE: Duration = Duration::from_millis(400);

/// Executable and auto-approve flags for one variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentCommand {
    pub program: String,
    pub auto_approve_args: Vec<String>,
}

impl AgentCommand {
    pub fn for_variant(variant: Variant) -> Self {
        Self {
            program: variant.program().to_string(),
            auto_approve_args: variant
                .auto_approve_args()
                .iter()
                .map(|a| a.to_string())
                .collect(),
        }
    }
}

/// Controller defaults, typically filled from the config file
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub variant: Variant,
    pub no_auto_approve: bool,
    pub working_dir: PathBuf,
    pub claude: AgentCommand,
    pub codex: AgentCommand,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            variant: Variant::default(),
            no_auto_approve: false,
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            claude: AgentCommand::for_variant(Variant::Claude),
            codex: AgentCommand::for_variant(Variant::Codex),
        }
    }
}

impl SessionSettings {
    pub fn command(&self, variant: Variant) -> &AgentCommand {
        match variant {
            Variant::Claude => &self.claude,
            Variant::Codex => &self.codex,
        }
    }

    /// Flags passed to `variant`, honouring auto-approve suppression
    pub fn args_for(&self, variant: Variant, no_auto_approve: bool) -> Vec<String> {
        if no_auto_approve {
            Vec::new()
        } else {
            self.command(variant).auto_approve_args.clone()
        }
    }

    fn spawn_spec(&self, variant: Variant, no_auto_approve: bool) -> SpawnSpec {
        SpawnSpec {
            program: self.command(variant).program.clone(),
            args: self.args_for(variant, no_auto_approve),
            cwd: self.working_dir.clone(),
        }
    }
}

struct ActiveSession {
    handle: SessionHandle,
    flags: Vec<String>,
    started_at: DateTime<Utc>,
    started: Instant,
    killer: Box<dyn ChildKiller + Send + Sync>,
    bridge: PtyBridge,
    // Dropping the master hangs up the child's terminal
    _master: Box<dyn MasterPty + Send>,
}

struct ControllerState {
    lifecycle: SessionState,
    session: Option<ActiveSession>,
    last_exit: Option<ExitRecord>,
    variant: Variant,
    flags: Vec<String>,
}

struct Shared {
    state: Mutex<ControllerState>,
    lifecycle_tx: watch::Sender<SessionState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_session_running(&self, id: u64) -> bool {
        self.lock()
            .session
            .as_ref()
            .is_some_and(|s| s.handle.id == id)
    }
}

/// Owns one agent child at a time and exposes start/stop/restart/status
pub struct SessionController {
    settings: SessionSettings,
    terminal: Arc<dyn LocalTerminal>,
    runtime: Handle,
    input: PtyInput,
    local: LocalInputRelay,
    dispatcher: CommandDispatcher,
    shared: Arc<Shared>,
    next_id: AtomicU64,
}

impl SessionController {
    pub fn new(settings: SessionSettings, terminal: Arc<dyn LocalTerminal>, runtime: Handle) -> Self {
        let input = PtyInput::new();
        let (lifecycle_tx, _) = watch::channel(SessionState::NotStarted);
        let state = ControllerState {
            lifecycle: SessionState::NotStarted,
            session: None,
            last_exit: None,
            variant: settings.variant,
            flags: settings.args_for(settings.variant, settings.no_auto_approve),
        };

        Self {
            dispatcher: CommandDispatcher::new(input.clone(), runtime.clone()),
            settings,
            terminal,
            runtime,
            input,
            local: LocalInputRelay::new(),
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                lifecycle_tx,
            }),
            next_id: AtomicU64::new(1),
        }
    }

    /// Build on the ambient tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn current(settings: SessionSettings, terminal: Arc<dyn LocalTerminal>) -> Self {
        Self::new(settings, terminal, Handle::current())
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().session.is_some()
    }

    /// Spawn the agent, or return the running session's handle unchanged.
    ///
    /// On spawn failure the controller is left exactly as it was.
    pub fn start(&self, options: StartOptions) -> Result<SessionHandle> {
        let mut state = self.shared.lock();
        if let Some(session) = &state.session {
            debug!(id = session.handle.id, "session already running");
            return Ok(session.handle.clone());
        }

        let variant = options.variant.unwrap_or(self.settings.variant);
        let no_auto_approve = options
            .no_auto_approve
            .unwrap_or(self.settings.no_auto_approve);
        let spec = self.settings.spawn_spec(variant, no_auto_approve);

        let SpawnedAgent {
            child,
            master,
            reader,
            writer,
            pid,
        } = spawn_agent(&spec)?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let killer = child.clone_killer();
        self.input.attach(id, writer);

        let (tx, rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
        spawn_output_reader(reader, tx);

        let tail = Arc::new(Mutex::new(OutputTail::new()));
        let bridge = {
            let _rt = self.runtime.enter();
            PtyBridge::attach(
                id,
                Arc::clone(&self.terminal),
                self.input.clone(),
                rx,
                Arc::clone(&tail),
                &self.local,
            )
        };

        let handle = SessionHandle { id, pid, variant };
        state.session = Some(ActiveSession {
            handle: handle.clone(),
            flags: spec.args.clone(),
            started_at: Utc::now(),
            started: Instant::now(),
            killer,
            bridge,
            _master: master,
        });
        state.lifecycle = SessionState::Running;
        state.last_exit = None;
        state.variant = variant;
        state.flags = spec.args;
        self.shared.lifecycle_tx.send_replace(SessionState::Running);

        spawn_exit_observer(Arc::clone(&self.shared), self.input.clone(), id, child, tail);

        info!(
            "--- Persistent {} session started (pid {:?}) ---",
            variant.label(),
            pid
        );
        Ok(handle)
    }

    /// Interrupt the agent, escalating to a termination signal after
    /// [`STOP_GRACE`] if it is still alive.
    ///
    /// Returns as soon as the stop is requested; `status().running` may read
    /// true for a moment afterwards.
    pub fn stop(&self) -> StopOutcome {
        let (id, pid, killer) = {
            let state = self.shared.lock();
            let Some(session) = &state.session else {
                return StopOutcome::not_running();
            };
            (
                session.handle.id,
                session.handle.pid,
                session.killer.clone_killer(),
            )
        };

        info!(id, "stopping agent session");
        self.input.write_for(id, &[INTERRUPT]);

        let shared = Arc::clone(&self.shared);
        self.runtime.spawn(async move {
            tokio::time::sleep(STOP_GRACE).await;
            if shared.is_session_running(id) {
                warn!(id, "agent ignored interrupt, terminating");
                terminate(pid, killer);
            }
        });

        StopOutcome::requested()
    }

    /// Stop if running, wait [`RESTART_SETTLE`], then start
    pub async fn restart(&self, options: StartOptions) -> Result<SessionHandle> {
        if self.is_running() {
            self.stop();
            tokio::time::sleep(RESTART_SETTLE).await;
        }
        self.start(options)
    }

    pub fn status(&self) -> SessionStatus {
        let state = self.shared.lock();
        let session = state.session.as_ref();
        SessionStatus {
            running: session.is_some(),
            state: state.lifecycle,
            variant: session.map_or(state.variant, |s| s.handle.variant),
            pid: session.and_then(|s| s.handle.pid),
            started_at: session.map(|s| s.started_at),
            uptime_secs: session.map(|s| s.started.elapsed().as_secs()),
            working_dir: self.settings.working_dir.clone(),
            flags: session.map_or_else(|| state.flags.clone(), |s| s.flags.clone()),
            last_exit: state.last_exit.clone(),
        }
    }

    /// Schedule a text command for the active session.
    ///
    /// Does nothing when no session is running; callers check
    /// `is_running()` first if they need to report that.
    pub fn send_command(&self, text: &str) -> Option<JoinHandle<()>> {
        self.dispatcher.send(text)
    }

    /// Watch lifecycle transitions
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.lifecycle_tx.subscribe()
    }

    /// Resolve once no session is running, yielding the last exit record
    pub async fn wait_for_exit(&self) -> Option<ExitRecord> {
        let mut rx = self.subscribe();
        // The sender lives in `self`, so this cannot fail while we borrow it
        let _ = rx.wait_for(|s| *s != SessionState::Running).await;
        self.shared.lock().last_exit.clone()
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        let session = self.shared.lock().session.take();
        if let Some(mut session) = session {
            debug!(id = session.handle.id, "controller dropped, killing agent");
            self.input.detach(session.handle.id);
            session.bridge.detach();
            let _ = session.killer.kill();
        }
        self.local.close();
    }
}

fn terminate(pid: Option<u32>, mut killer: Box<dyn ChildKiller + Send + Sync>) {
    if let Some(pid) = pid {
        match signal::terminate(pid) {
            Ok(reached) => {
                debug!(pid, ?reached, "termination signal sent");
                return;
            }
            Err(e) => debug!("signal delivery failed, falling back to killer: {}", e),
        }
    }
    if let Err(e) = killer.kill() {
        warn!("Failed to kill agent: {}", e);
    }
}

fn exit_record(status: &ExitStatus) -> ExitRecord {
    let signal = status.signal().map(str::to_string);
    ExitRecord {
        code: signal
            .is_none()
            .then(|| i32::try_from(status.exit_code()).unwrap_or(i32::MAX)),
        signal,
        at: Utc::now(),
    }
}

/// Wait for `child` on a dedicated thread and retire the session when it goes
fn spawn_exit_observer(
    shared: Arc<Shared>,
    input: PtyInput,
    id: u64,
    mut child: Box<dyn Child + Send + Sync>,
    tail: Arc<Mutex<OutputTail>>,
) {
    thread::spawn(move || {
        let record = match child.wait() {
            Ok(status) => exit_record(&status),
            Err(e) => {
                warn!("Failed to wait for agent: {}", e);
                ExitRecord {
                    code: None,
                    signal: None,
                    at: Utc::now(),
                }
            }
        };

        {
            let mut state = shared.lock();
            if !state.session.as_ref().is_some_and(|s| s.handle.id == id) {
                // Already retired by the controller's drop
                return;
            }
            state.lifecycle = SessionState::Exited;
            state.last_exit = Some(record.clone());
            input.detach(id);
            // Restore the terminal before a new start can engage its own guard
            if let Some(session) = state.session.take() {
                session.bridge.detach();
            }
        }
        shared.lifecycle_tx.send_replace(SessionState::Exited);

        match (record.code, &record.signal) {
            (Some(0), _) => info!(id, "agent exited cleanly"),
            (code, signal) => {
                let recent = tail.lock().unwrap_or_else(PoisonError::into_inner).text();
                if recent.is_empty() {
                    warn!(id, ?code, ?signal, "agent exited");
                } else {
                    error!(id, ?code, ?signal, "agent exited. Last output:\n{}", recent);
                }
            }
        }
    });
}
