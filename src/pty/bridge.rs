//! Full-duplex relay between the agent's PTY and the local terminal.
//!
//! Per attached session:
//! - a reader thread pulling raw bytes off the PTY master into a bounded channel
//! - a relay task running each chunk through the interceptor to the display
//!
//! Per controller:
//! - one local input thread, routed to whichever session is attached now

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::input::{INTERRUPT, LocalInput, classify_local_input};
use super::intercept::{Interception, intercept};
use super::tail::OutputTail;
use super::terminal::{LocalTerminal, TerminalModeGuard};
use super::writer::PtyInput;

/// Chunks buffered between the PTY reader and the relay task
pub const OUTPUT_CHANNEL_CAPACITY: usize = 64;

const READ_BUF: usize = 4096;

/// Pump PTY output into `tx` until EOF or the receiver goes away
pub fn spawn_output_reader(
    mut reader: Box<dyn Read + Send>,
    tx: mpsc::Sender<Vec<u8>>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut buf = [0u8; READ_BUF];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => {
                    debug!("PTY EOF");
                    break;
                }
                Ok(n) => {
                    if tx.blocking_send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    // EIO is how Linux reports a hung-up PTY
                    debug!("PTY read ended: {}", e);
                    break;
                }
            }
        }
    })
}

#[derive(Clone)]
struct Route {
    session: u64,
    guard: Arc<TerminalModeGuard>,
    attached: Arc<AtomicBool>,
}

#[derive(Default)]
struct RelayState {
    route: Mutex<Option<Route>>,
    started: AtomicBool,
    closed: AtomicBool,
}

/// Local keystrokes for the lifetime of a controller.
///
/// The local input stream is read by a single thread, started on first
/// attach. Bridges register themselves as the current route and withdraw on
/// detach, so a keystroke always goes to the session attached when it
/// arrives.
#[derive(Clone, Default)]
pub struct LocalInputRelay {
    state: Arc<RelayState>,
}

impl LocalInputRelay {
    pub fn new() -> Self {
        Self::default()
    }

    fn route(&self) -> MutexGuard<'_, Option<Route>> {
        self.state.route.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Session currently receiving local input
    pub fn current_session(&self) -> Option<u64> {
        self.route().as_ref().map(|r| r.session)
    }

    /// Stop forwarding; the reader thread exits on its next read
    pub fn close(&self) {
        self.state.closed.store(true, Ordering::SeqCst);
        self.route().take();
    }

    fn route_to(&self, route: Route) {
        *self.route() = Some(route);
    }

    fn withdraw(&self, session: u64) {
        let mut route = self.route();
        if route.as_ref().is_some_and(|r| r.session == session) {
            *route = None;
        }
    }

    fn ensure_running(&self, terminal: &Arc<dyn LocalTerminal>, input: &PtyInput) {
        if self.state.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(reader) = terminal.input() else {
            return;
        };
        let relay = self.clone();
        let terminal = Arc::clone(terminal);
        let input = input.clone();
        thread::spawn(move || relay.pump(reader, &input, terminal.as_ref()));
        debug!("local input relay started");
    }

    fn pump(&self, mut reader: Box<dyn Read + Send>, input: &PtyInput, terminal: &dyn LocalTerminal) {
        let mut buf = [0u8; 1024];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("Local input closed: {}", e);
                    break;
                }
            };
            if self.state.closed.load(Ordering::SeqCst) {
                break;
            }

            match classify_local_input(&buf[..n]) {
                LocalInput::Forward(bytes) => match self.current_session() {
                    Some(session) => {
                        input.write_for(session, bytes);
                    }
                    None => debug!(len = bytes.len(), "no session attached, local input dropped"),
                },
                LocalInput::Interrupt { before } => {
                    self.interrupt(before, input);
                    terminal.terminate();
                    return;
                }
            }
        }
        debug!("local input relay finished");
    }

    /// Forward `before`, restore the terminal, interrupt the child
    fn interrupt(&self, before: &[u8], input: &PtyInput) {
        self.state.closed.store(true, Ordering::SeqCst);
        let Some(route) = self.route().take() else {
            info!("interrupt received on local input with no session, shutting down");
            return;
        };
        if !before.is_empty() {
            input.write_for(route.session, before);
        }
        info!(session = route.session, "interrupt received on local input, shutting down");
        route.guard.restore();
        input.write_for(route.session, &[INTERRUPT]);
        route.attached.store(false, Ordering::SeqCst);
    }
}

/// An attached relay for one session
pub struct PtyBridge {
    session: u64,
    guard: Arc<TerminalModeGuard>,
    attached: Arc<AtomicBool>,
    local: LocalInputRelay,
}

impl PtyBridge {
    /// Engage raw mode, start relaying output for `session` and route
    /// local input to it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn attach(
        session: u64,
        terminal: Arc<dyn LocalTerminal>,
        input: PtyInput,
        output: mpsc::Receiver<Vec<u8>>,
        tail: Arc<Mutex<OutputTail>>,
        local: &LocalInputRelay,
    ) -> Self {
        let guard = Arc::new(TerminalModeGuard::engage(Arc::clone(&terminal)));
        let attached = Arc::new(AtomicBool::new(true));

        tokio::spawn(relay_output(
            session,
            output,
            terminal.output(),
            input.clone(),
            tail,
        ));

        local.route_to(Route {
            session,
            guard: Arc::clone(&guard),
            attached: Arc::clone(&attached),
        });
        local.ensure_running(&terminal, &input);

        debug!(session, "bridge attached");
        Self {
            session,
            guard,
            attached,
            local: local.clone(),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    /// Restore the terminal and stop routing local input here. Idempotent.
    pub fn detach(&self) {
        if self.attached.swap(false, Ordering::SeqCst) {
            debug!(session = self.session, "bridge detached");
        }
        self.local.withdraw(self.session);
        self.guard.restore();
    }
}

impl Drop for PtyBridge {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Apply interception to one chunk: answer queries, schedule the
/// confirmation bypass, and return the bytes meant for display.
async fn process_chunk(session: u64, chunk: &[u8], input: &PtyInput) -> Vec<u8> {
    let Interception {
        display,
        replies,
        confirm,
    } = intercept(chunk);

    if !replies.is_empty() {
        debug!(session, count = replies.len(), "answering cursor position queries");
        input.deliver(session, replies.concat()).await;
    }

    if let Some(confirm) = confirm {
        info!(session, "confirmation prompt detected, accepting default");
        confirm.spawn(&Handle::current(), input.clone(), session);
    }

    display
}

async fn relay_output(
    session: u64,
    mut rx: mpsc::Receiver<Vec<u8>>,
    mut sink: Box<dyn Write + Send>,
    input: PtyInput,
    tail: Arc<Mutex<OutputTail>>,
) {
    while let Some(chunk) = rx.recv().await {
        let display = process_chunk(session, &chunk, &input).await;
        if display.is_empty() {
            continue;
        }
        tail.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .append(&display);
        if let Err(e) = sink.write_all(&display).and_then(|()| sink.flush()) {
            warn!("Failed to write agent output: {}", e);
        }
    }
    debug!(session, "output relay finished");
}
