//! Session records exposed to the messaging layer.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{SessionState, StopReason, Variant};

/// Overrides applied to a single `start()` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartOptions {
    /// Agent to launch; falls back to the controller default
    pub variant: Option<Variant>,
    /// Suppress the auto-approve flags; falls back to the controller default
    pub no_auto_approve: Option<bool>,
}

impl StartOptions {
    pub fn variant(variant: Variant) -> Self {
        Self {
            variant: Some(variant),
            ..Self::default()
        }
    }

    pub fn suppress_auto_approve(mut self, suppress: bool) -> Self {
        self.no_auto_approve = Some(suppress);
        self
    }
}

/// How the last child terminated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitRecord {
    pub code: Option<i32>,
    pub signal: Option<String>,
    pub at: DateTime<Utc>,
}

/// Identity of a running session, returned by `start()`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandle {
    /// Controller-local sequence number; changes on every fresh spawn
    pub id: u64,
    pub pid: Option<u32>,
    pub variant: Variant,
}

/// Result of `stop()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopOutcome {
    /// True when a stop was requested; termination itself is asynchronous
    pub stopped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<StopReason>,
}

impl StopOutcome {
    pub fn requested() -> Self {
        Self {
            stopped: true,
            reason: None,
        }
    }

    pub fn not_running() -> Self {
        Self {
            stopped: false,
            reason: Some(StopReason::NotRunning),
        }
    }
}

/// Point-in-time view of the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub running: bool,
    pub state: SessionState,
    pub variant: Variant,
    pub pid: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
    pub uptime_secs: Option<u64>,
    pub working_dir: PathBuf,
    pub flags: Vec<String>,
    pub last_exit: Option<ExitRecord>,
}
