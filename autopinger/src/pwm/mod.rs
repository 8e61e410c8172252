/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! PWM output driver.
//!
//! The sysfs `duty_cycle` attribute takes a decimal nanosecond count in
//! `0..=period`.  [`PwmDuty`] hides that behind a percent API and is the only
//! thing in the daemon that touches the attribute after bring-up.
//!
//! ```text
//! percent (0.0..=100.0) ──round(p * PWM_MAX / 100)──► "373" ──seek(0)+write──► duty_cycle
//! ```
//!
//! The [`DutyCycle`] trait is the seam the supervisor and the pulse worker are
//! written against, so tests can swap in a recording actuator.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use thiserror::Error;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Duty-cycle denominator, also the PWM period in nanoseconds.
pub const PWM_MAX: u32 = 1000;

// ── Error type ────────────────────────────────────────────────────────────────

/// Failures while talking to the `duty_cycle` attribute.
///
/// None of these are fatal to an activation: the LED is cosmetic.
#[derive(Debug, Error)]
pub enum PwmError {
    #[error("duty {percent}% is outside 0..=100")]
    OutOfRange { percent: f64 },

    #[error("cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("write to {} failed: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("read from {} failed: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} holds a non-numeric duty value {value:?}", path.display())]
    Parse { path: PathBuf, value: String },
}

// ── Conversions ───────────────────────────────────────────────────────────────

/// Map a percentage onto a duty count: `round(percent * period / 100)`.
pub fn percent_to_count(percent: f64, period_count: u32) -> Result<u32, PwmError> {
    if !(0.0..=100.0).contains(&percent) {
        return Err(PwmError::OutOfRange { percent });
    }
    Ok((percent * f64::from(period_count) / 100.0).round() as u32)
}

/// Inverse of [`percent_to_count`]; counts above the period clamp to 100 %.
pub fn count_to_percent(count: u32, period_count: u32) -> f64 {
    if period_count == 0 {
        return 0.0;
    }
    (f64::from(count.min(period_count)) / f64::from(period_count)) * 100.0
}

// ── DutyCycle seam ────────────────────────────────────────────────────────────

/// Anything that can drive an LED duty cycle.
///
/// `Send + 'static` because the pulse worker moves its own handle into a
/// spawned task.
pub trait DutyCycle: Send + 'static {
    /// Integer maximum of the duty range (`PWM_MAX` for real hardware).
    fn period_count(&self) -> u32;

    /// Write `percent` of the period.
    fn set_duty(&mut self, percent: f64) -> Result<(), PwmError>;

    /// Read back the current duty count.
    fn read_count(&mut self) -> Result<u32, PwmError>;

    /// Write the literal `"0"` that parks the line.
    fn park(&mut self) -> Result<(), PwmError>;

    /// Open an independent handle onto the same output.
    fn reopen(&self) -> Result<Self, PwmError>
    where
        Self: Sized;
}

// ── PwmDuty ───────────────────────────────────────────────────────────────────

/// Handle on a sysfs `duty_cycle` attribute.
#[derive(Debug)]
pub struct PwmDuty {
    file: File,
    path: PathBuf,
    period_count: u32,
}

impl PwmDuty {
    /// Open `path` read-write, non-blocking.
    pub fn open(path: impl AsRef<Path>, period_count: u32) -> Result<Self, PwmError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&path)
            .map_err(|source| PwmError::Open {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            file,
            path,
            period_count,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// sysfs attributes must be overwritten from offset 0 in a single write.
    fn write_raw(&mut self, value: &str) -> Result<(), PwmError> {
        let path = &self.path;
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.write_all(value.as_bytes()))
            .map_err(|source| PwmError::Write {
                path: path.clone(),
                source,
            })
    }
}

impl DutyCycle for PwmDuty {
    fn period_count(&self) -> u32 {
        self.period_count
    }

    fn set_duty(&mut self, percent: f64) -> Result<(), PwmError> {
        let count = percent_to_count(percent, self.period_count)?;
        self.write_raw(&count.to_string())
    }

    fn read_count(&mut self) -> Result<u32, PwmError> {
        let mut buf = [0u8; 64];
        let n = self
            .file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.read(&mut buf))
            .map_err(|source| PwmError::Read {
                path: self.path.clone(),
                source,
            })?;
        let text = String::from_utf8_lossy(&buf[..n]);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(0);
        }
        trimmed.parse().map_err(|_| PwmError::Parse {
            path: self.path.clone(),
            value: trimmed.to_string(),
        })
    }

    fn park(&mut self) -> Result<(), PwmError> {
        self.write_raw("0")
    }

    fn reopen(&self) -> Result<Self, PwmError> {
        Self::open(&self.path, self.period_count)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn duty_file(initial: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(initial.as_bytes()).unwrap();
        f
    }

    // ── Conversions ───────────────────────────────────────────────────────────

    #[test]
    fn percent_maps_onto_pwm_max() {
        assert_eq!(percent_to_count(0.0, PWM_MAX).unwrap(), 0);
        assert_eq!(percent_to_count(0.5, PWM_MAX).unwrap(), 5);
        assert_eq!(percent_to_count(37.3, PWM_MAX).unwrap(), 373);
        assert_eq!(percent_to_count(99.5, PWM_MAX).unwrap(), 995);
        assert_eq!(percent_to_count(100.0, PWM_MAX).unwrap(), 1000);
    }

    #[test]
    fn percent_rounds_to_nearest_count() {
        // 0.05 % of 1000 = 0.5 → rounds away from zero
        assert_eq!(percent_to_count(0.05, PWM_MAX).unwrap(), 1);
        assert_eq!(percent_to_count(0.04, PWM_MAX).unwrap(), 0);
    }

    #[test]
    fn out_of_range_percent_is_rejected() {
        assert!(matches!(
            percent_to_count(-0.5, PWM_MAX),
            Err(PwmError::OutOfRange { .. })
        ));
        assert!(matches!(
            percent_to_count(100.5, PWM_MAX),
            Err(PwmError::OutOfRange { .. })
        ));
        assert!(percent_to_count(f64::NAN, PWM_MAX).is_err());
    }

    #[test]
    fn count_to_percent_inverts_and_clamps() {
        assert_eq!(count_to_percent(500, PWM_MAX), 50.0);
        assert_eq!(count_to_percent(2000, PWM_MAX), 100.0);
        assert_eq!(count_to_percent(10, 0), 0.0);
    }

    // ── PwmDuty ───────────────────────────────────────────────────────────────

    #[test]
    fn set_duty_writes_decimal_count() {
        let f = duty_file("");
        let mut duty = PwmDuty::open(f.path(), PWM_MAX).unwrap();
        duty.set_duty(50.0).unwrap();
        assert_eq!(std::fs::read_to_string(f.path()).unwrap(), "500");
    }

    #[test]
    fn set_duty_overwrites_from_offset_zero() {
        let f = duty_file("");
        let mut duty = PwmDuty::open(f.path(), PWM_MAX).unwrap();
        duty.set_duty(12.3).unwrap();
        duty.set_duty(45.6).unwrap();
        assert_eq!(std::fs::read_to_string(f.path()).unwrap(), "456");
    }

    #[test]
    fn shorter_value_lands_at_offset_zero() {
        // sysfs replaces the whole attribute on every write.  A regular file
        // keeps the old tail, so only the leading bytes are ours.
        let f = duty_file("");
        let mut duty = PwmDuty::open(f.path(), PWM_MAX).unwrap();
        duty.set_duty(100.0).unwrap();
        duty.set_duty(0.5).unwrap();
        assert_eq!(std::fs::read_to_string(f.path()).unwrap(), "5000");
    }

    #[test]
    fn read_count_parses_sysfs_value() {
        let f = duty_file("373\n");
        let mut duty = PwmDuty::open(f.path(), PWM_MAX).unwrap();
        assert_eq!(duty.read_count().unwrap(), 373);
    }

    #[test]
    fn read_count_treats_empty_attribute_as_zero() {
        let f = duty_file("");
        let mut duty = PwmDuty::open(f.path(), PWM_MAX).unwrap();
        assert_eq!(duty.read_count().unwrap(), 0);
    }

    #[test]
    fn read_count_rejects_garbage() {
        let f = duty_file("abc\n");
        let mut duty = PwmDuty::open(f.path(), PWM_MAX).unwrap();
        assert!(matches!(duty.read_count(), Err(PwmError::Parse { .. })));
    }

    #[test]
    fn park_writes_literal_zero() {
        let f = duty_file("");
        let mut duty = PwmDuty::open(f.path(), PWM_MAX).unwrap();
        duty.park().unwrap();
        assert_eq!(std::fs::read_to_string(f.path()).unwrap(), "0");
    }

    #[test]
    fn reopen_targets_the_same_attribute() {
        let f = duty_file("");
        let duty = PwmDuty::open(f.path(), PWM_MAX).unwrap();
        let mut other = duty.reopen().unwrap();
        assert_eq!(other.path(), duty.path());
        other.set_duty(100.0).unwrap();
        assert_eq!(std::fs::read_to_string(f.path()).unwrap(), "1000");
    }

    #[test]
    fn open_missing_attribute_fails_with_path() {
        let err = PwmDuty::open("/nonexistent/pwm0/duty_cycle", PWM_MAX).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/pwm0/duty_cycle"));
    }
}
