//! PTY (pseudo-terminal) handling for agent subprocess management.
//!
//! This module encapsulates all PTY-related functionality:
//! - `spawn`: agent process spawning with fixed geometry
//! - `bridge`: output relay and controller-wide local keystroke routing
//! - `intercept`: cursor query answers and confirmation bypass
//! - `input`: local input classification (reserved Ctrl+C)
//! - `writer`: shared child input and delayed write chains
//! - `terminal`: local terminal access and raw-mode guard
//! - `tail`: recent output kept for exit diagnostics

mod bridge;
mod input;
mod intercept;
pub(crate) mod signal;
mod spawn;
mod tail;
mod terminal;
mod writer;

pub use bridge::{LocalInputRelay, OUTPUT_CHANNEL_CAPACITY, PtyBridge, spawn_output_reader};
pub use input::{INTERRUPT, LocalInput, classify_local_input};
pub use intercept::{
    CONFIRM_MARKERS, CONFIRM_SETTLE, CPR_QUERY, CPR_REPLY, Interception, confirm_keystrokes,
    contains_confirm_marker, intercept,
};
pub use spawn::{DEFAULT_TERM, PTY_COLS, PTY_ROWS, SpawnSpec, SpawnedAgent, resolve_term, spawn_agent};
pub use tail::{OutputTail, strip_ansi_codes};
pub use terminal::{DetachedTerminal, LocalTerminal, StdTerminal, TerminalModeGuard};
pub use writer::{PendingWrite, PtyInput, WriteStep};

#[cfg(test)]
pub(crate) use terminal::tests::FakeTerminal;
#[cfg(test)]
pub(crate) use writer::tests::RecordingWriter;
