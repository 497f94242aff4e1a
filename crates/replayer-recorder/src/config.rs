//! User configuration, read from `config.json` in the data directory

use crate::monitor::MonitorConfig;
use crate::recorder::RecorderConfig;
use crate::replay::ReplayConfig;
use crate::speed::DEFAULT_DELAY_MS;
use replayer_core::{vk, Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const CONFIG_FILE: &str = "config.json";
/// Overrides the data directory
pub const DIR_ENV: &str = "INPUT_REPLAYER_DIR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayerConfig {
    pub speed_ms: u64,
    pub grace_period_ms: u64,
    pub settle_window_ms: u64,
    pub process_poll_ms: u64,
    /// Upper bound on waiting for new processes before an action
    pub readiness_timeout_ms: u64,
    pub record_toggle_key: u32,
    pub ignore_injected: bool,
}

impl Default for ReplayerConfig {
    fn default() -> Self {
        Self {
            speed_ms: DEFAULT_DELAY_MS,
            grace_period_ms: 2000,
            settle_window_ms: 2000,
            process_poll_ms: 1000,
            readiness_timeout_ms: 10_000,
            record_toggle_key: vk::F9,
            ignore_injected: false,
        }
    }
}

impl ReplayerConfig {
    /// Read `config.json` from `dir`. A missing file gives the defaults.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path)?;
        serde_json::from_str(&text).map_err(|e| {
            Error::validation_failed(&path.display().to_string(), &e.to_string())
        })
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        fs::write(dir.join(CONFIG_FILE), serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn recorder(&self) -> RecorderConfig {
        RecorderConfig {
            record_toggle_key: self.record_toggle_key,
            ignore_injected: self.ignore_injected,
        }
    }

    pub fn replay(&self) -> ReplayConfig {
        ReplayConfig {
            delay: Duration::from_millis(self.speed_ms),
            grace_period: Duration::from_millis(self.grace_period_ms),
        }
    }

    pub fn monitor(&self) -> MonitorConfig {
        MonitorConfig {
            settle_window: Duration::from_millis(self.settle_window_ms),
            poll_interval: Duration::from_millis(self.process_poll_ms),
        }
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms)
    }
}

/// `$INPUT_REPLAYER_DIR`, else `.input-replayer` in the home directory
pub fn data_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    let home_var = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
    let home = std::env::var_os(home_var).ok_or_else(|| {
        Error::invalid_state(format!("{} not set", home_var))
            .with_suggestions(vec![format!("Set {} to choose a data directory", DIR_ENV)])
    })?;
    Ok(PathBuf::from(home).join(".input-replayer"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReplayerConfig::load(dir.path()).unwrap();
        assert_eq!(config, ReplayerConfig::default());
        assert_eq!(config.replay().grace_period, Duration::from_millis(2000));
        assert_eq!(config.recorder().record_toggle_key, vk::F9);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), r#"{"speed_ms": 40}"#).unwrap();

        let config = ReplayerConfig::load(dir.path()).unwrap();
        assert_eq!(config.replay().delay, Duration::from_millis(40));
        assert_eq!(config.monitor().settle_window, Duration::from_millis(2000));
        assert!(!config.ignore_injected);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReplayerConfig {
            readiness_timeout_ms: 500,
            ignore_injected: true,
            ..Default::default()
        };
        config.save(dir.path()).unwrap();
        assert_eq!(ReplayerConfig::load(dir.path()).unwrap(), config);
    }

    #[test]
    fn garbage_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "speed_ms = 40").unwrap();
        let err = ReplayerConfig::load(dir.path()).unwrap_err();
        assert_eq!(err.code, replayer_core::ErrorCode::ValidationFailed);
    }
}
