//! RelayBot
//!
//! Drives a long-lived interactive coding agent (Claude Code or Codex) through
//! a pseudo-terminal so remote text commands can be typed into it as if a
//! person were at the keyboard.
//!
//! # Components
//! - `session::SessionController`: owns the child and its lifecycle
//! - `pty::PtyBridge`: relays bytes between the PTY and the local terminal
//! - `pty::intercept`: answers cursor queries and accepts approval prompts
//! - `session::CommandDispatcher`: types remote commands into the agent

pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod pty;
pub mod session;
pub mod utils;

pub use config::RelayConfig;
pub use error::{Result, SessionError};
pub use models::{
    ExitRecord, SessionHandle, SessionState, SessionStatus, StartOptions, StopOutcome, StopReason,
    Variant,
};
pub use session::{SessionController, SessionSettings};
