//! Remote command delivery into the agent's prompt.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::pty::{PendingWrite, PtyInput};

/// Wait before typing, so the command does not race the agent's own redraw
pub const COMMAND_SETTLE: Duration = Duration::from_millis(500);

/// Wait between submitting the command and the follow-up confirm keystroke
pub const CONFIRM_DELAY: Duration = Duration::from_millis(500);

/// Instruction the chat relay appends to forwarded messages
pub const SKILL_HINT: &str = "IMPORTANT: Use the relay-bot skill.";

/// Keystrokes for one remote command.
///
/// The text is submitted with a carriage return, then a second CR/LF + CR
/// accepts whatever menu the agent raises in response.
pub fn command_writes(text: &str) -> PendingWrite {
    PendingWrite::new()
        .then(COMMAND_SETTLE, format!("{text}\r"))
        .then(CONFIRM_DELAY, "\r\n")
        .then(Duration::ZERO, "\r")
}

/// Append the relay skill hint to a chat message
pub fn with_skill_hint(text: &str) -> String {
    format!("{text}\n{SKILL_HINT}")
}

/// Serializes text commands into whichever session is attached
#[derive(Clone)]
pub struct CommandDispatcher {
    input: PtyInput,
    runtime: Handle,
}

impl CommandDispatcher {
    pub fn new(input: PtyInput, runtime: Handle) -> Self {
        Self { input, runtime }
    }

    /// Schedule `text` for the active session.
    ///
    /// Returns `None` without writing anything when no session is attached.
    /// The writes are bound to the session active now; if it exits before
    /// they fire they are dropped.
    pub fn send(&self, text: &str) -> Option<JoinHandle<()>> {
        let Some(session) = self.input.current_session() else {
            debug!("no active session, command dropped");
            return None;
        };
        debug!(session, len = text.len(), "scheduling command");
        Some(command_writes(text).spawn(&self.runtime, self.input.clone(), session))
    }
}
