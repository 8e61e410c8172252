//! Daemon configuration.
//!
//! Two layers feed the immutable [`Config`] record the supervisor runs with:
//!
//! * command-line flags (target host, button line, PWM indicator, auto
//!   interval) — parsed in `main.rs`;
//! * an optional YAML tuning file (`--config`) for board-specific details that
//!   rarely change.  Every key is optional:
//!
//! ```yaml
//! sysfs_root: /sys/class
//! pwm_chip: 0
//! pwm_channel: 0
//! active_window_secs: 5
//! ping_program: ping
//! ping_count: 30
//! initial_delay_secs: 1
//! settle_timeout_ms: 1000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

// ── Private YAML deserialization types ────────────────────────────────────────

/// Fields as they appear in the YAML file.
///
/// Unknown keys are rejected so a typo does not silently fall back to a
/// default.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TuningFile {
    sysfs_root: Option<PathBuf>,
    pwm_chip: Option<u32>,
    pwm_channel: Option<u32>,
    active_window_secs: Option<u64>,
    ping_program: Option<String>,
    ping_count: Option<u32>,
    initial_delay_secs: Option<u64>,
    settle_timeout_ms: Option<u64>,
}

// ── Tuning ────────────────────────────────────────────────────────────────────

/// Board and timing details with production defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuning {
    /// Root of the sysfs class tree (`/sys/class`).
    pub sysfs_root: PathBuf,
    pub pwm_chip: u32,
    pub pwm_channel: u32,
    /// Time between probe spawn and forced termination.
    pub active_window_secs: u64,
    /// Probe executable, looked up through `PATH`.
    pub ping_program: String,
    /// Value passed with `-c`; informational since the window cuts ping short.
    pub ping_count: u32,
    /// Delay before the first timer expiration.
    pub initial_delay_secs: u64,
    /// How long to wait for sysfs to create an exported pin directory.
    pub settle_timeout_ms: u64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            sysfs_root: PathBuf::from("/sys/class"),
            pwm_chip: 0,
            pwm_channel: 0,
            active_window_secs: 5,
            ping_program: String::from("ping"),
            ping_count: 30,
            initial_delay_secs: 1,
            settle_timeout_ms: 1_000,
        }
    }
}

impl Tuning {
    /// Parse `path`, filling absent keys with defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is invalid
    /// (including unknown keys).
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading tuning from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open configuration file: {}", path.display()))?;

        // An empty document deserialises as unit, not as an empty map.
        let file: TuningFile = if content.trim().is_empty() {
            TuningFile::default()
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML file: {}", path.display()))?
        };

        let d = Self::default();
        let tuning = Self {
            sysfs_root: file.sysfs_root.unwrap_or(d.sysfs_root),
            pwm_chip: file.pwm_chip.unwrap_or(d.pwm_chip),
            pwm_channel: file.pwm_channel.unwrap_or(d.pwm_channel),
            active_window_secs: file.active_window_secs.unwrap_or(d.active_window_secs),
            ping_program: file.ping_program.unwrap_or(d.ping_program),
            ping_count: file.ping_count.unwrap_or(d.ping_count),
            initial_delay_secs: file.initial_delay_secs.unwrap_or(d.initial_delay_secs),
            settle_timeout_ms: file.settle_timeout_ms.unwrap_or(d.settle_timeout_ms),
        };
        debug!(?tuning, "tuning loaded");
        Ok(tuning)
    }
}

// ── Config ────────────────────────────────────────────────────────────────────

/// Invalid flag combinations.  All of them are usage errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("--ping-IP must not be empty")]
    EmptyTarget,

    #[error("--button-gpio is required unless --auto is given")]
    NoSource,

    #[error("--auto must be a positive number of seconds")]
    ZeroInterval,

    #[error("active window must be at least one second")]
    ZeroWindow,

    #[error("ping_program must not be empty")]
    EmptyProgram,
}

/// Everything the supervisor needs, fixed for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub target_host: String,
    pub button_gpio: Option<u32>,
    pub button_enabled: bool,
    pub timer_enabled: bool,
    pub pwm_enabled: bool,
    /// `0` when the timer is disabled.
    pub auto_interval_seconds: u64,
    pub active_window_seconds: u64,
    pub tuning: Tuning,
}

impl Config {
    /// Validate and assemble the runtime configuration.
    pub fn new(
        target_host: impl Into<String>,
        button_gpio: Option<u32>,
        use_pwm: bool,
        auto_seconds: Option<u64>,
        tuning: Tuning,
    ) -> Result<Self, ConfigError> {
        let target_host = target_host.into();
        if target_host.trim().is_empty() {
            return Err(ConfigError::EmptyTarget);
        }
        if button_gpio.is_none() && auto_seconds.is_none() {
            return Err(ConfigError::NoSource);
        }
        if auto_seconds == Some(0) {
            return Err(ConfigError::ZeroInterval);
        }
        if tuning.active_window_secs == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if tuning.ping_program.is_empty() {
            return Err(ConfigError::EmptyProgram);
        }

        Ok(Self {
            target_host,
            button_gpio,
            button_enabled: button_gpio.is_some(),
            timer_enabled: auto_seconds.is_some(),
            pwm_enabled: use_pwm,
            auto_interval_seconds: auto_seconds.unwrap_or(0),
            active_window_seconds: tuning.active_window_secs,
            tuning,
        })
    }

    pub fn active_window(&self) -> Duration {
        Duration::from_secs(self.active_window_seconds)
    }

    /// `Some(interval)` when the periodic source is enabled.
    pub fn auto_interval(&self) -> Option<Duration> {
        self.timer_enabled
            .then(|| Duration::from_secs(self.auto_interval_seconds))
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.tuning.initial_delay_secs)
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.tuning.settle_timeout_ms)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
