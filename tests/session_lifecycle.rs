//! End-to-end lifecycle tests against real PTY children.
#![cfg(unix)]

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use relaybot::pty::{CPR_QUERY, DetachedTerminal, LocalTerminal};
use relaybot::session::AgentCommand;
use relaybot::{SessionController, SessionSettings, SessionState, StartOptions, StopReason};

const WAIT: Duration = Duration::from_secs(5);

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    fn bytes(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Headless terminal that records what the agent printed
#[derive(Default)]
struct CaptureTerminal {
    out: Capture,
}

impl LocalTerminal for CaptureTerminal {
    fn input(&self) -> Option<Box<dyn Read + Send>> {
        None
    }

    fn output(&self) -> Box<dyn Write + Send> {
        Box::new(self.out.clone())
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

/// One shared keystroke stream, like stdin: every reader handed out pulls
/// from the same source, so a stale reader would steal keystrokes.
#[derive(Clone)]
struct SharedKeys(Arc<Mutex<mpsc::Receiver<Vec<u8>>>>);

impl Read for SharedKeys {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.0.lock().unwrap().recv() {
            Ok(bytes) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            Err(_) => Ok(0),
        }
    }
}

/// Interactive terminal driven from the test body
struct KeyboardTerminal {
    keys: SharedKeys,
    out: Capture,
    raw: AtomicBool,
    terminated: AtomicBool,
}

impl KeyboardTerminal {
    fn new() -> (Arc<Self>, mpsc::Sender<Vec<u8>>) {
        let (tx, rx) = mpsc::channel();
        let term = Arc::new(Self {
            keys: SharedKeys(Arc::new(Mutex::new(rx))),
            out: Capture::default(),
            raw: AtomicBool::new(false),
            terminated: AtomicBool::new(false),
        });
        (term, tx)
    }

    fn raw(&self) -> bool {
        self.raw.load(Ordering::SeqCst)
    }

    fn terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }
}

impl LocalTerminal for KeyboardTerminal {
    fn input(&self) -> Option<Box<dyn Read + Send>> {
        Some(Box::new(self.keys.clone()))
    }

    fn output(&self) -> Box<dyn Write + Send> {
        Box::new(self.out.clone())
    }

    fn is_tty(&self) -> bool {
        true
    }

    fn is_raw(&self) -> io::Result<bool> {
        Ok(self.raw())
    }

    fn set_raw(&self, enabled: bool) -> io::Result<()> {
        self.raw.store(enabled, Ordering::SeqCst);
        Ok(())
    }

    fn terminate(&self) {
        self.terminated.store(true, Ordering::SeqCst);
    }
}

async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {}", what));
}

fn settings(program: &str, args: &[&str]) -> SessionSettings {
    SessionSettings {
        claude: AgentCommand {
            program: program.to_string(),
            auto_approve_args: args.iter().map(|a| a.to_string()).collect(),
        },
        working_dir: std::env::temp_dir(),
        ..SessionSettings::default()
    }
}

fn cat_controller() -> SessionController {
    SessionController::current(settings("cat", &[]), Arc::new(DetachedTerminal))
}

async fn wait_for_output(capture: &Capture, needle: &str) {
    tokio::time::timeout(WAIT, async {
        while !capture.text().contains(needle) {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("never saw {:?} in {:?}", needle, capture.text()));
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let ctl = cat_controller();
    let first = ctl.start(StartOptions::default()).unwrap();
    let second = ctl.start(StartOptions::default()).unwrap();

    assert!(first.pid.is_some());
    assert_eq!(first, second);
    assert!(ctl.is_running());
}

#[tokio::test]
async fn test_stop_without_session() {
    let ctl = cat_controller();
    let outcome = ctl.stop();
    assert!(!outcome.stopped);
    assert_eq!(outcome.reason, Some(StopReason::NotRunning));
}

#[tokio::test]
async fn test_start_status_stop_cycle() {
    let ctl = cat_controller();
    assert!(!ctl.status().running);

    ctl.start(StartOptions::default().suppress_auto_approve(false))
        .unwrap();
    let status = ctl.status();
    assert!(status.running);
    assert_eq!(status.state, SessionState::Running);
    assert!(status.pid.is_some());
    assert!(status.started_at.is_some());
    assert_eq!(status.uptime_secs, Some(0));
    assert_eq!(status.working_dir, std::env::temp_dir());

    assert!(ctl.stop().stopped);
    let exit = tokio::time::timeout(WAIT, ctl.wait_for_exit())
        .await
        .expect("agent should exit after stop");

    let status = ctl.status();
    assert!(!status.running);
    assert_eq!(status.state, SessionState::Exited);
    assert_eq!(status.pid, None);
    assert_eq!(status.uptime_secs, None);
    assert!(exit.is_some());
    assert_eq!(status.last_exit, exit);
}

#[tokio::test]
async fn test_stop_escalates_when_interrupt_ignored() {
    let ctl = SessionController::current(
        settings("sh", &["-c", "trap '' INT; sleep 30"]),
        Arc::new(DetachedTerminal),
    );
    ctl.start(StartOptions::default()).unwrap();
    // Give the shell time to install its trap
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(ctl.stop().stopped);
    let exit = tokio::time::timeout(WAIT, ctl.wait_for_exit())
        .await
        .expect("termination signal should end the agent")
        .expect("exit recorded");
    assert_ne!(exit.code, Some(0));
}

#[tokio::test]
async fn test_exit_code_recorded() {
    let ctl = SessionController::current(settings("sh", &["-c", "exit 3"]), Arc::new(DetachedTerminal));
    ctl.start(StartOptions::default()).unwrap();

    let exit = tokio::time::timeout(WAIT, ctl.wait_for_exit())
        .await
        .unwrap()
        .expect("exit recorded");
    assert_eq!(exit.code, Some(3));
    assert_eq!(exit.signal, None);
    assert!(!ctl.is_running());
}

#[tokio::test]
async fn test_start_after_exit_spawns_fresh_session() {
    let ctl = SessionController::current(settings("sh", &["-c", "exit 0"]), Arc::new(DetachedTerminal));
    let first = ctl.start(StartOptions::default()).unwrap();
    tokio::time::timeout(WAIT, ctl.wait_for_exit()).await.unwrap();

    let second = ctl.start(StartOptions::default()).unwrap();
    assert_ne!(first.id, second.id);
}

#[tokio::test]
async fn test_restart_replaces_child() {
    let ctl = cat_controller();
    let first = ctl.start(StartOptions::default()).unwrap();
    let second = ctl.restart(StartOptions::default()).await.unwrap();

    assert_ne!(first.id, second.id);
    assert_ne!(first.pid, second.pid);
    assert!(ctl.is_running());
}

#[tokio::test]
async fn test_send_command_reaches_agent() {
    let term = Arc::new(CaptureTerminal::default());
    let ctl = SessionController::current(settings("cat", &[]), term.clone());
    ctl.start(StartOptions::default()).unwrap();

    let task = ctl.send_command("hello relay").expect("session running");
    task.await.unwrap();

    wait_for_output(&term.out, "hello relay").await;
}

#[tokio::test]
async fn test_cursor_queries_never_reach_display() {
    let term = Arc::new(CaptureTerminal::default());
    let ctl = SessionController::current(
        settings("sh", &["-c", "printf 'left\\033[6nright'; sleep 1"]),
        term.clone(),
    );
    ctl.start(StartOptions::default()).unwrap();

    wait_for_output(&term.out, "right").await;
    let shown = term.out.bytes();
    assert!(!shown.windows(CPR_QUERY.len()).any(|w| w == CPR_QUERY));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_starts_spawn_one_child() {
    const CALLERS: usize = 8;
    let ctl = cat_controller();
    let barrier = Barrier::new(CALLERS);

    let handles: Vec<_> = thread::scope(|scope| {
        let workers: Vec<_> = (0..CALLERS)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    ctl.start(StartOptions::default()).unwrap()
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    let first = &handles[0];
    assert!(first.pid.is_some());
    assert!(handles.iter().all(|h| h == first));
    // Ids are only consumed by successful spawns
    assert_eq!(first.id, 1);

    let second = ctl.restart(StartOptions::default()).await.unwrap();
    assert_eq!(second.id, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_keystrokes_reach_restarted_session() {
    let (term, keys) = KeyboardTerminal::new();
    let ctl = SessionController::current(settings("cat", &[]), term.clone());

    ctl.start(StartOptions::default()).unwrap();
    assert!(term.raw());
    ctl.restart(StartOptions::default()).await.unwrap();
    assert!(term.raw());

    keys.send(b"after restart\r".to_vec()).unwrap();
    wait_for_output(&term.out, "after restart").await;

    keys.send(vec![3]).unwrap();
    wait_until("Ctrl+C to terminate", || term.terminated()).await;
    assert!(!term.raw());
    let exit = tokio::time::timeout(WAIT, ctl.wait_for_exit())
        .await
        .expect("interrupt should end the agent");
    assert!(exit.is_some());
}
