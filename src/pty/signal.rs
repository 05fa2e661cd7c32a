//! Termination signal for an agent that ignored the stop interrupt.

use std::io;

/// What a termination request reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Termination {
    /// The agent led its own process group; every member was signalled
    Group,
    /// Only the agent process itself was signalled
    Process,
    /// Nothing left to signal
    AlreadyGone,
}

/// Send SIGTERM to the agent.
///
/// PTY children lead their own session, so the whole group is signalled and
/// helpers the agent forked go down with it. A pid that shares our group is
/// signalled alone, never the group.
#[cfg(unix)]
pub(crate) fn terminate(pid: u32) -> io::Result<Termination> {
    let pid = libc::pid_t::try_from(pid)
        .ok()
        .filter(|pid| *pid > 0)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid agent pid"))?;

    // SAFETY: getpgid and kill take plain integers and touch no memory.
    let (pgid, sent) = unsafe {
        let pgid = libc::getpgid(pid);
        if pgid == pid {
            (pgid, libc::killpg(pgid, libc::SIGTERM))
        } else {
            (pgid, libc::kill(pid, libc::SIGTERM))
        }
    };

    if sent == 0 {
        return Ok(if pgid == pid {
            Termination::Group
        } else {
            Termination::Process
        });
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(Termination::AlreadyGone)
    } else {
        Err(err)
    }
}

#[cfg(not(unix))]
pub(crate) fn terminate(_pid: u32) -> io::Result<Termination> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "process signals are unix-only",
    ))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::{CommandExt, ExitStatusExt};
    use std::process::Command;

    #[test]
    fn test_zero_pid_is_rejected() {
        let err = terminate(0).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_group_leader_gets_group_signal() {
        let mut child = Command::new("sleep").arg("30").process_group(0).spawn().unwrap();
        assert_eq!(terminate(child.id()).unwrap(), Termination::Group);
        assert_eq!(child.wait().unwrap().signal(), Some(libc::SIGTERM));
    }

    #[test]
    fn test_child_in_our_group_is_signalled_alone() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        assert_eq!(terminate(child.id()).unwrap(), Termination::Process);
        assert_eq!(child.wait().unwrap().signal(), Some(libc::SIGTERM));
    }

    #[test]
    fn test_reaped_child_is_already_gone() {
        let mut child = Command::new("true").process_group(0).spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        assert_eq!(terminate(pid).unwrap(), Termination::AlreadyGone);
    }
}
