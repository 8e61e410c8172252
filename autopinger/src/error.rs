/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Process-level error type and its exit codes.
//!
//! Errors that reach `main` end the process.  Errors raised while an
//! activation is running never get here; the supervisor logs them and goes
//! back to waiting.
//!
//! | Variant | Exit code |
//! |---|---|
//! | `Usage` | 1 |
//! | `Peripheral` | 2 |
//! | `Register` | 3 |
//! | `UnknownReadiness` | 4 |
//! | `Button` | 5 |
//! | `Timer` | 6 |
//! | `Runtime` | 7 |
//! | `Fork` | 100 |
//! | `Session` | 200 |

use thiserror::Error;

use crate::config::ConfigError;
use crate::gpio::GpioError;
use crate::sysfs::SysfsError;
use crate::timer::TimerError;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("{0}")]
    Usage(#[from] ConfigError),

    #[error("peripheral setup failed: {0}")]
    Peripheral(#[from] SysfsError),

    /// A source handle could not be added to the multiplexer.
    #[error("multiplexer registration of {what} failed: {source}")]
    Register {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The multiplexer woke up without an armed source behind it.
    #[error("readiness reported with no registered source")]
    UnknownReadiness,

    /// The button handle broke after registration.
    #[error("button source failed: {0}")]
    Button(#[source] GpioError),

    #[error("timer configuration failed: {0}")]
    Timer(#[source] TimerError),

    #[error("runtime setup failed: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("could not fork a daemon process: {0}")]
    Fork(#[source] std::io::Error),

    #[error("could not become session leader: {0}")]
    Session(#[source] std::io::Error),
}

impl From<TimerError> for DaemonError {
    fn from(e: TimerError) -> Self {
        match e {
            TimerError::Register(source) => DaemonError::Register {
                what: "timer",
                source,
            },
            other => DaemonError::Timer(other),
        }
    }
}

impl From<GpioError> for DaemonError {
    fn from(e: GpioError) -> Self {
        match e {
            GpioError::Register { source, .. } => DaemonError::Register {
                what: "button",
                source,
            },
            other => DaemonError::Button(other),
        }
    }
}

impl DaemonError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            DaemonError::Usage(_) => 1,
            DaemonError::Peripheral(_) => 2,
            DaemonError::Register { .. } => 3,
            DaemonError::UnknownReadiness => 4,
            DaemonError::Button(_) => 5,
            DaemonError::Timer(_) => 6,
            DaemonError::Runtime(_) => 7,
            DaemonError::Fork(_) => 100,
            DaemonError::Session(_) => 200,
        }
    }
}
