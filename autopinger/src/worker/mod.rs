/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Short-lived workers started once per activation.
//!
//! * [`probe`] — the external `ping` process, reachable only through its PID.
//! * [`pulse`] — the LED ramp, a cancellable task on the supervisor's runtime.
//!
//! Both expose the same contract to the supervisor: a handle that can be
//! asked to stop and is then joined exactly once.

pub mod probe;
pub mod pulse;

pub use probe::{ChildProbe, Probe, ProbeCommand, ProbeExit, ProbeLauncher, ProcessLauncher};
pub use pulse::{PulseWorker, Ramp};

use thiserror::Error;

use crate::pwm::PwmError;

/// Failures while starting, signalling or reaping a worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("cannot spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("spawned '{program}' but the child has no PID")]
    NoPid { program: String },

    #[error("sending {signal} to PID {pid} failed: {source}")]
    Signal {
        pid: u32,
        signal: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("reaping PID {pid} failed: {source}")]
    Reap {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("pulse worker could not open its duty handle: {0}")]
    PulseSetup(#[source] PwmError),

    #[error("pulse worker did not join cleanly: {0}")]
    PulseJoin(#[source] tokio::task::JoinError),
}
