//! Key/value configuration file.
//!
//! `~/.relaybot/config.conf` holds one `KEY=VALUE` per line. Blank lines and
//! `#` comments are skipped; everything after the first `=` is the value.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{Result, SessionError};
use crate::models::Variant;
use crate::session::SessionSettings;

pub const CONFIG_DIR_NAME: &str = ".relaybot";
pub const CONFIG_FILE_NAME: &str = "config.conf";

pub const KEY_WORKING_DIR: &str = "WORKING_DIR";
pub const KEY_AGENT: &str = "AGENT";
pub const KEY_NO_AUTO_APPROVE: &str = "NO_AUTO_APPROVE";

/// Parsed config file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayConfig {
    values: HashMap<String, String>,
}

impl RelayConfig {
    /// Default location under the home directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from the default location. A missing file yields `None`.
    pub fn load() -> Result<Option<Self>> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|e| SessionError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Some(Self::parse(&content)))
    }

    pub fn parse(content: &str) -> Self {
        let values = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| (key.trim(), value.trim()))
            .filter(|(key, _)| !key.is_empty())
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn working_dir(&self) -> Option<PathBuf> {
        self.get(KEY_WORKING_DIR)
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
    }

    pub fn variant(&self) -> Option<Variant> {
        let raw = self.get(KEY_AGENT).filter(|v| !v.is_empty())?;
        match raw.parse() {
            Ok(variant) => Some(variant),
            Err(e) => {
                warn!("Ignoring {}: {}", KEY_AGENT, e);
                None
            }
        }
    }

    pub fn no_auto_approve(&self) -> Option<bool> {
        self.get(KEY_NO_AUTO_APPROVE).map(parse_flag)
    }

    /// Overlay this file onto controller settings
    pub fn apply(&self, settings: &mut SessionSettings) {
        if let Some(dir) = self.working_dir() {
            settings.working_dir = dir;
        }
        if let Some(variant) = self.variant() {
            settings.variant = variant;
        }
        if let Some(flag) = self.no_auto_approve() {
            settings.no_auto_approve = flag;
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
