//! The invoking terminal and raw-mode restoration.

use std::io::{self, IsTerminal, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tracing::{debug, warn};

/// The local side of the relay: where keystrokes come from, where agent
/// output goes, and how the process is torn down on Ctrl+C.
pub trait LocalTerminal: Send + Sync {
    /// Reader over local keystrokes, or `None` for no local input.
    ///
    /// Called once per controller; the reader outlives individual sessions.
    fn input(&self) -> Option<Box<dyn Read + Send>>;

    /// Sink for the agent's output
    fn output(&self) -> Box<dyn Write + Send>;

    /// Whether the input stream is an interactive terminal
    fn is_tty(&self) -> bool;

    fn is_raw(&self) -> io::Result<bool>;

    fn set_raw(&self, enabled: bool) -> io::Result<()>;

    /// End the controlling process after the reserved interrupt byte
    fn terminate(&self);
}

/// Process stdin/stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct StdTerminal;

impl LocalTerminal for StdTerminal {
    fn input(&self) -> Option<Box<dyn Read + Send>> {
        Some(Box::new(io::stdin()))
    }

    fn output(&self) -> Box<dyn Write + Send> {
        Box::new(io::stdout())
    }

    fn is_tty(&self) -> bool {
        io::stdin().is_terminal()
    }

    fn is_raw(&self) -> io::Result<bool> {
        stdin_is_raw()
    }

    fn set_raw(&self, enabled: bool) -> io::Result<()> {
        if enabled {
            enable_raw_mode()
        } else {
            disable_raw_mode()
        }
    }

    fn terminate(&self) {
        std::process::exit(0);
    }
}

/// Read the line discipline of stdin itself.
///
/// crossterm only tracks raw mode it enabled, so a terminal handed to us
/// already raw would read as cooked.
#[cfg(unix)]
fn stdin_is_raw() -> io::Result<bool> {
    fd_is_raw(libc::STDIN_FILENO)
}

#[cfg(not(unix))]
fn stdin_is_raw() -> io::Result<bool> {
    crossterm::terminal::is_raw_mode_enabled()
}

/// Raw here means neither canonical line editing nor echo
#[cfg(unix)]
pub(crate) fn fd_is_raw(fd: std::os::fd::RawFd) -> io::Result<bool> {
    let mut termios = std::mem::MaybeUninit::<libc::termios>::uninit();
    // SAFETY: tcgetattr writes a full termios on success and we only read it then.
    let termios = unsafe {
        if libc::tcgetattr(fd, termios.as_mut_ptr()) != 0 {
            return Err(io::Error::last_os_error());
        }
        termios.assume_init()
    };
    Ok(termios.c_lflag & (libc::ICANON | libc::ECHO) == 0)
}

/// No local terminal: output is discarded and nothing is read.
///
/// Used when the relay runs headless under a supervisor.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedTerminal;

impl LocalTerminal for DetachedTerminal {
    fn input(&self) -> Option<Box<dyn Read + Send>> {
        None
    }

    fn output(&self) -> Box<dyn Write + Send> {
        Box::new(io::sink())
    }

    fn is_tty(&self) -> bool {
        false
    }

    fn is_raw(&self) -> io::Result<bool> {
        Ok(false)
    }

    fn set_raw(&self, _enabled: bool) -> io::Result<()> {
        Ok(())
    }

    fn terminate(&self) {}
}

/// Raw mode held for the lifetime of a bridge.
///
/// Captures the mode found at attach and puts exactly that mode back on
/// `restore()` or drop, whichever happens first.
pub struct TerminalModeGuard {
    terminal: Arc<dyn LocalTerminal>,
    was_raw: bool,
    engaged: bool,
    restored: AtomicBool,
}

impl TerminalModeGuard {
    /// Switch the terminal to raw mode if it is interactive
    pub fn engage(terminal: Arc<dyn LocalTerminal>) -> Self {
        let engaged = terminal.is_tty();
        let was_raw = engaged && terminal.is_raw().unwrap_or(false);

        if engaged {
            if let Err(e) = terminal.set_raw(true) {
                warn!("Failed to enable raw mode: {}", e);
            } else {
                debug!(was_raw, "raw mode enabled");
            }
        }

        Self {
            terminal,
            was_raw,
            engaged,
            restored: AtomicBool::new(false),
        }
    }

    pub fn was_raw(&self) -> bool {
        self.was_raw
    }

    /// Put the prior mode back. Safe to call repeatedly.
    pub fn restore(&self) {
        if self.restored.swap(true, Ordering::SeqCst) || !self.engaged {
            return;
        }
        if let Err(e) = self.terminal.set_raw(self.was_raw) {
            warn!("Failed to restore terminal mode: {}", e);
        } else {
            debug!(raw = self.was_raw, "terminal mode restored");
        }
    }
}

impl Drop for TerminalModeGuard {
    fn drop(&mut self) {
        self.restore();
    }
}
