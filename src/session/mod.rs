//! Agent session lifecycle and command delivery.

mod controller;
mod dispatch;

pub use controller::{
    AgentCommand, RESTART_SETTLE, STOP_GRACE, SessionController, SessionSettings,
};
pub use dispatch::{
    COMMAND_SETTLE, CONFIRM_DELAY, CommandDispatcher, SKILL_HINT, command_writes, with_skill_hint,
};
