/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Pulse worker: a triangular LED ramp that runs until told to stop.
//!
//! ```text
//! duty
//! 100 ┤          ╱╲          ╱╲
//!     │        ╱    ╲      ╱    ╲
//!   0 ┼──────╱────────╲──╱────────╲── …
//!       rise 0→99.5 @7ms  fall 100→0 @3.5ms
//! ```
//!
//! The worker owns its own duty handle (re-opened from the supervisor's) and
//! is stopped through a oneshot channel.  Fading back to zero afterwards is
//! the supervisor's job.

use std::convert::Infallible;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::WorkerError;
use crate::pwm::DutyCycle;

// ── Ramp ──────────────────────────────────────────────────────────────────────

/// Shape of one triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ramp {
    /// Percent change per write.
    pub step: f64,
    /// Dwell after each rising write.
    pub rise_dwell: Duration,
    /// Dwell after each falling write.
    pub fall_dwell: Duration,
}

impl Default for Ramp {
    fn default() -> Self {
        Self {
            step: 0.5,
            rise_dwell: Duration::from_micros(7_000),
            fall_dwell: Duration::from_micros(3_500),
        }
    }
}

impl Ramp {
    fn steps(&self) -> u32 {
        (100.0 / self.step).round() as u32
    }

    /// `0, step, …, 100 - step` — the top is left to the falling half.
    pub fn rise(&self) -> impl Iterator<Item = f64> {
        let step = self.step;
        (0..self.steps()).map(move |i| f64::from(i) * step)
    }

    /// `100, 100 - step, …, 0`.
    pub fn fall(&self) -> impl Iterator<Item = f64> {
        let step = self.step;
        (0..=self.steps()).rev().map(move |i| f64::from(i) * step)
    }

    /// Drive `duty` through triangles forever.
    ///
    /// Write failures are logged once per worker and otherwise ignored.
    async fn drive<A: DutyCycle>(self, duty: &mut A) -> Infallible {
        let mut warned = false;
        loop {
            for percent in self.rise() {
                write_quietly(duty, percent, &mut warned);
                tokio::time::sleep(self.rise_dwell).await;
            }
            for percent in self.fall() {
                write_quietly(duty, percent, &mut warned);
                tokio::time::sleep(self.fall_dwell).await;
            }
        }
    }
}

fn write_quietly<A: DutyCycle>(duty: &mut A, percent: f64, warned: &mut bool) {
    if let Err(e) = duty.set_duty(percent) {
        if !*warned {
            warn!("pulse: {e}");
            *warned = true;
        }
    }
}

// ── PulseWorker ───────────────────────────────────────────────────────────────

/// Handle on a running pulse task.
#[derive(Debug)]
pub struct PulseWorker {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl PulseWorker {
    /// Re-open `output` and start ramping it on the current runtime.
    ///
    /// Fails only if the independent duty handle cannot be opened.
    pub fn spawn<A: DutyCycle>(output: &A, ramp: Ramp) -> Result<Self, WorkerError> {
        let mut duty = output.reopen().map_err(WorkerError::PulseSetup)?;
        let (stop, stopped) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = stopped => debug!("pulse: stop requested"),
                _ = ramp.drive(&mut duty) => {}
            }
        });

        Ok(Self { stop, task })
    }

    /// Ask the ramp to stop and wait for the task to finish.
    pub async fn stop(self) -> Result<(), WorkerError> {
        // The task may already be gone (panicked); join reports that.
        let _ = self.stop.send(());
        self.task.await.map_err(WorkerError::PulseJoin)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
