//! Agent process spawning with PTY setup.

use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::PathBuf;

use portable_pty::{Child, CommandBuilder, MasterPty, PtySize, native_pty_system};
use tracing::info;

use crate::error::{Result, SessionError};

/// Fixed terminal geometry presented to the agent
pub const PTY_COLS: u16 = 80;
pub const PTY_ROWS: u16 = 30;

/// TERM value used when the parent environment has none
pub const DEFAULT_TERM: &str = "xterm-256color";

/// What to run and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

/// Handles produced by a successful spawn
pub struct SpawnedAgent {
    pub child: Box<dyn Child + Send + Sync>,
    pub master: Box<dyn MasterPty + Send>,
    pub reader: Box<dyn Read + Send>,
    pub writer: Box<dyn Write + Send>,
    pub pid: Option<u32>,
}

/// TERM to hand the child: the inherited one, or the default if unset
pub fn resolve_term(inherited: Option<OsString>) -> OsString {
    inherited
        .filter(|term| !term.is_empty())
        .unwrap_or_else(|| OsString::from(DEFAULT_TERM))
}

/// Spawn the agent attached to a fresh PTY.
///
/// The child inherits the parent environment. Nothing is left behind on
/// failure: the PTY pair is dropped with the error.
pub fn spawn_agent(spec: &SpawnSpec) -> Result<SpawnedAgent> {
    let pty_system = native_pty_system();
    let pair = pty_system
        .openpty(PtySize {
            rows: PTY_ROWS,
            cols: PTY_COLS,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(SessionError::pty)?;

    let mut cmd = CommandBuilder::new(&spec.program);
    cmd.args(&spec.args);
    cmd.cwd(&spec.cwd);
    cmd.env("TERM", resolve_term(std::env::var_os("TERM")));

    info!("Starting agent: {} {:?} in {}", spec.program, spec.args, spec.cwd.display());

    let child = pair
        .slave
        .spawn_command(cmd)
        .map_err(|e| SessionError::Spawn {
            program: spec.program.clone(),
            reason: e.to_string(),
        })?;

    // The slave must go so EOF is seen on the master when the child exits
    drop(pair.slave);

    let reader = pair.master.try_clone_reader().map_err(SessionError::pty)?;
    let writer = pair.master.take_writer().map_err(SessionError::pty)?;
    let pid = child.process_id();

    Ok(SpawnedAgent {
        child,
        master: pair.master,
        reader,
        writer,
        pid,
    })
}
