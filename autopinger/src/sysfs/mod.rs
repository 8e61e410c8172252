/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Peripheral bring-up through the sysfs pseudo-filesystem.
//!
//! Leaves the button GPIO and the PWM channel in the state the supervisor
//! relies on and hands back the opened attribute handles:
//!
//! | Attribute | Value |
//! |---|---|
//! | `gpio/gpio<N>/direction` | `in` |
//! | `gpio/gpio<N>/edge` | `both` |
//! | `gpio/gpio<N>/active_low` | `0` |
//! | `gpio/gpio<N>/value` | opened `O_RDONLY \| O_NONBLOCK` |
//! | `pwm/pwmchip<C>/pwm<K>/period` | `1000` |
//! | `pwm/pwmchip<C>/pwm<K>/polarity` | `normal` |
//! | `pwm/pwmchip<C>/pwm<K>/enable` | `1` |
//! | `pwm/pwmchip<C>/pwm<K>/duty_cycle` | `0`, opened `O_RDWR \| O_NONBLOCK` |
//!
//! After an `export` write the kernel creates the per-pin directory
//! asynchronously (udev), so the directory is polled for instead of assumed.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info};

use crate::gpio;
use crate::pwm::{PwmDuty, PwmError, PWM_MAX};

/// Poll interval while waiting for an exported directory to appear.
const SETTLE_POLL: Duration = Duration::from_millis(20);

// ── Error type ────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SysfsError {
    #[error("write {value:?} to {} failed: {source}", path.display())]
    Write {
        path: PathBuf,
        value: String,
        #[source]
        source: io::Error,
    },

    #[error("open {} failed: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("read {} failed: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} did not appear within {timeout:?} after export", path.display())]
    NotExported { path: PathBuf, timeout: Duration },

    #[error(transparent)]
    Pwm(#[from] PwmError),
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn write_attr(path: &Path, value: &str) -> Result<(), SysfsError> {
    debug!("writing {value:?} to {}", path.display());
    std::fs::write(path, value).map_err(|source| SysfsError::Write {
        path: path.to_path_buf(),
        value: value.to_string(),
        source,
    })
}

/// Block until `path` exists or `timeout` elapses.
fn wait_for(path: &Path, timeout: Duration) -> Result<(), SysfsError> {
    let deadline = Instant::now() + timeout;
    while !path.exists() {
        if Instant::now() >= deadline {
            return Err(SysfsError::NotExported {
                path: path.to_path_buf(),
                timeout,
            });
        }
        std::thread::sleep(SETTLE_POLL);
    }
    Ok(())
}

/// Write `id` to `export` unless `dir` already exists, then wait for `dir`.
fn ensure_exported(export: &Path, id: u32, dir: &Path, timeout: Duration) -> Result<(), SysfsError> {
    if dir.is_dir() {
        debug!("{} already exported", dir.display());
        return Ok(());
    }
    info!("exporting {} via {}", id, export.display());
    write_attr(export, &id.to_string())?;
    wait_for(dir, timeout)
}

// ── Sysfs ─────────────────────────────────────────────────────────────────────

/// Entry point for bring-up, rooted at `/sys/class` in production.
#[derive(Debug, Clone)]
pub struct Sysfs {
    root: PathBuf,
    settle_timeout: Duration,
}

impl Sysfs {
    pub fn new(root: impl Into<PathBuf>, settle_timeout: Duration) -> Self {
        Self {
            root: root.into(),
            settle_timeout,
        }
    }

    pub fn gpio_dir(&self, gpio: u32) -> PathBuf {
        self.root.join("gpio").join(format!("gpio{gpio}"))
    }

    pub fn pwm_dir(&self, chip: u32, channel: u32) -> PathBuf {
        self.root
            .join("pwm")
            .join(format!("pwmchip{chip}"))
            .join(format!("pwm{channel}"))
    }

    /// Configure `gpio` as an edge-notifying input and open its `value`.
    ///
    /// One priming read is done before returning so a level that was already
    /// present does not look like a fresh edge.
    pub fn prepare_button(&self, gpio: u32) -> Result<File, SysfsError> {
        let dir = self.gpio_dir(gpio);
        ensure_exported(
            &self.root.join("gpio").join("export"),
            gpio,
            &dir,
            self.settle_timeout,
        )?;

        write_attr(&dir.join("direction"), "in")?;
        write_attr(&dir.join("edge"), "both")?;
        write_attr(&dir.join("active_low"), "0")?;

        let value_path = dir.join("value");
        let mut value = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&value_path)
            .map_err(|source| SysfsError::Open {
                path: value_path.clone(),
                source,
            })?;

        let level = gpio::read_level(&mut value).map_err(|source| SysfsError::Read {
            path: value_path.clone(),
            source,
        })?;
        info!(gpio, ?level, "button ready");
        Ok(value)
    }

    /// Configure the PWM channel with a `PWM_MAX` ns period, duty 0, and
    /// return a handle on its `duty_cycle`.
    pub fn prepare_pwm(&self, chip: u32, channel: u32) -> Result<PwmDuty, SysfsError> {
        let chip_dir = self.root.join("pwm").join(format!("pwmchip{chip}"));
        let dir = self.pwm_dir(chip, channel);
        ensure_exported(&chip_dir.join("export"), channel, &dir, self.settle_timeout)?;

        // Polarity is only writable while disabled; duty must never exceed
        // the period.
        write_attr(&dir.join("enable"), "0")?;
        write_attr(&dir.join("duty_cycle"), "0")?;
        write_attr(&dir.join("period"), &PWM_MAX.to_string())?;
        write_attr(&dir.join("polarity"), "normal")?;
        write_attr(&dir.join("enable"), "1")?;

        let duty = PwmDuty::open(dir.join("duty_cycle"), PWM_MAX)?;
        info!(chip, channel, period_ns = PWM_MAX, "pwm ready");
        Ok(duty)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
