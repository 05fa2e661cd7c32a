//! Enums used throughout the session manager
//!
//! This module contains the small state and selection types shared by the
//! controller, the status snapshot and the config layer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which agent executable a session drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    #[default]
    Claude,
    Codex,
}

impl Variant {
    /// Executable name resolved through PATH
    pub fn program(&self) -> &'static str {
        match self {
            Variant::Claude => "claude",
            Variant::Codex => "codex",
        }
    }

    /// Flags granting unattended approval of destructive actions
    pub fn auto_approve_args(&self) -> &'static [&'static str] {
        match self {
            Variant::Claude => &["--dangerously-skip-permissions"],
            Variant::Codex => &["--yolo"],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Variant::Claude => "Claude",
            Variant::Codex => "Codex",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "claude" => Ok(Variant::Claude),
            "codex" => Ok(Variant::Codex),
            other => Err(format!("unknown agent variant: {other}")),
        }
    }
}

/// Lifecycle state of the controller's session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    NotStarted,
    Running,
    Exited,
}

/// Why a stop request did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    NotRunning,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::NotRunning => "not_running",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_default_is_claude() {
        assert_eq!(Variant::default(), Variant::Claude);
    }

    #[test]
    fn test_variant_auto_approve_args() {
        assert_eq!(
            Variant::Claude.auto_approve_args(),
            &["--dangerously-skip-permissions"]
        );
        assert_eq!(Variant::Codex.auto_approve_args(), &["--yolo"]);
    }

    #[test]
    fn test_variant_from_str() {
        assert_eq!("codex".parse::<Variant>(), Ok(Variant::Codex));
        assert_eq!(" Claude ".parse::<Variant>(), Ok(Variant::Claude));
        assert!("gemini".parse::<Variant>().is_err());
    }

    #[test]
    fn test_session_state_default() {
        assert_eq!(SessionState::default(), SessionState::NotStarted);
    }

    #[test]
    fn test_stop_reason_serializes_snake_case() {
        let json = serde_json::to_string(&StopReason::NotRunning).unwrap();
        assert_eq!(json, "\"not_running\"");
        assert_eq!(StopReason::NotRunning.as_str(), "not_running");
    }
}
