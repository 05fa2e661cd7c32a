//! Shared child-input handle and delayed write scheduling.

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

struct InputSlot {
    session: u64,
    writer: Box<dyn Write + Send>,
}

/// Writer half of the active child's PTY, shared by the bridge, the
/// interceptor and the dispatcher.
///
/// The slot is tagged with the session that installed it so writes queued
/// for an older session never reach a newer child.
#[derive(Clone, Default)]
pub struct PtyInput {
    slot: Arc<Mutex<Option<InputSlot>>>,
}

impl PtyInput {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<InputSlot>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install the writer for a freshly spawned session
    pub fn attach(&self, session: u64, writer: Box<dyn Write + Send>) {
        *self.lock() = Some(InputSlot { session, writer });
    }

    /// Drop the writer if it still belongs to `session`
    pub fn detach(&self, session: u64) {
        let mut slot = self.lock();
        if slot.as_ref().is_some_and(|s| s.session == session) {
            *slot = None;
        }
    }

    pub fn is_attached(&self) -> bool {
        self.lock().is_some()
    }

    pub fn current_session(&self) -> Option<u64> {
        self.lock().as_ref().map(|s| s.session)
    }

    /// Write to the child of `session` only, swallowing every failure.
    ///
    /// Returns whether the bytes were delivered.
    pub fn write_for(&self, session: u64, bytes: &[u8]) -> bool {
        let mut slot = self.lock();
        let Some(slot) = slot.as_mut().filter(|s| s.session == session) else {
            debug!(session, len = bytes.len(), "dropping write for inactive session");
            return false;
        };
        match slot.writer.write_all(bytes).and_then(|()| slot.writer.flush()) {
            Ok(()) => true,
            Err(e) => {
                debug!(session, "write to exited child discarded: {}", e);
                false
            }
        }
    }

    /// `write_for` from async code.
    ///
    /// The PTY write can block when the child stops draining its input, so
    /// it runs on the blocking pool instead of a runtime worker.
    pub async fn deliver(&self, session: u64, bytes: Vec<u8>) -> bool {
        let input = self.clone();
        tokio::task::spawn_blocking(move || input.write_for(session, &bytes))
            .await
            .unwrap_or(false)
    }
}

/// One sleep-then-write step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteStep {
    pub delay: Duration,
    pub bytes: Vec<u8>,
}

/// A chain of timed writes into the child's input.
///
/// Delays are relative to the previous step. Steps run sequentially on one
/// task; nothing is retried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingWrite {
    steps: Vec<WriteStep>,
}

impl PendingWrite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step that waits `delay` and then writes `bytes`
    pub fn then(mut self, delay: Duration, bytes: impl Into<Vec<u8>>) -> Self {
        self.steps.push(WriteStep {
            delay,
            bytes: bytes.into(),
        });
        self
    }

    pub fn steps(&self) -> &[WriteStep] {
        &self.steps
    }

    /// Concatenation of every step's payload, in write order
    pub fn payload(&self) -> Vec<u8> {
        self.steps.iter().flat_map(|s| s.bytes.iter().copied()).collect()
    }

    /// Run every step against `session`'s child.
    ///
    /// Writes after the session has gone are skipped silently.
    pub async fn run(self, input: PtyInput, session: u64) {
        for step in self.steps {
            if !step.delay.is_zero() {
                tokio::time::sleep(step.delay).await;
            }
            input.deliver(session, step.bytes).await;
        }
    }

    /// Fire-and-forget `run` on the given runtime
    pub fn spawn(self, runtime: &Handle, input: PtyInput, session: u64) -> JoinHandle<()> {
        runtime.spawn(self.run(input, session))
    }
}
