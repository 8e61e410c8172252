/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Event-loop supervisor.
//!
//! Two states, one thread of control:
//!
//! ```text
//!            ┌──────────── wake-up, not an activation ───────────┐
//!            ▼                                                    │
//!   ┌──────────────┐  press / timer   ┌───────────────────────────┴──┐
//!   │     IDLE     │ ───────────────► │            ACTIVE            │
//!   │ mux.wait()   │                  │ spawn probe → spawn pulse →  │
//!   │              │ ◄─────────────── │ sleep(window) → SIGTERM+reap │
//!   └──────────────┘  both reaped,    │ probe → stop pulse → fade    │
//!                     duty == 0       └──────────────────────────────┘
//! ```
//!
//! At most one activation exists at a time because [`Supervisor::activate`]
//! borrows the supervisor mutably and is awaited to completion before the
//! multiplexer is polled again.  Sources that became ready meanwhile are
//! serviced on the next IDLE pass; timer expirations collapse into one.
//!
//! Errors inside an activation never leave the loop: a probe that fails to
//! spawn aborts that activation only, and every PWM problem is a warning.

pub mod multiplexer;

pub use multiplexer::{Multiplexer, Trigger, Wakeup};

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::DaemonError;
use crate::gpio::EdgeSource;
use crate::pwm::{count_to_percent, DutyCycle};
use crate::worker::{Probe, ProbeCommand, ProbeExit, ProbeLauncher, PulseWorker, Ramp, WorkerError};

// ── Activation ────────────────────────────────────────────────────────────────

/// The live state of one activation.  Dropped before the next one starts.
#[derive(Debug)]
struct Activation<P> {
    sequence: u64,
    trigger: Trigger,
    probe: P,
    probe_pid: u32,
    pulse: Option<PulseWorker>,
    started_at: Instant,
}

/// What happened during one activation.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivationReport {
    pub sequence: u64,
    pub trigger: Trigger,
    pub probe_pid: u32,
    /// `None` if terminating or reaping the probe failed.
    pub probe_exit: Option<ProbeExit>,
    /// Whether a pulse worker ran (and was stopped) during this activation.
    pub pulse_ran: bool,
    /// Number of fade-out writes before the final park.
    pub fade_writes: usize,
    pub elapsed: Duration,
}

// ── Supervisor ────────────────────────────────────────────────────────────────

/// Owns the probe launcher, the optional PWM output, and the activation
/// counter.
#[derive(Debug)]
pub struct Supervisor<L, A> {
    launcher: L,
    actuator: Option<A>,
    command: ProbeCommand,
    window: Duration,
    ramp: Ramp,
    activations: u64,
}

impl<L, A> Supervisor<L, A>
where
    L: ProbeLauncher,
    A: DutyCycle,
{
    pub fn new(launcher: L, actuator: Option<A>, command: ProbeCommand, window: Duration) -> Self {
        Self {
            launcher,
            actuator,
            command,
            window,
            ramp: Ramp::default(),
            activations: 0,
        }
    }

    /// Replace the LED ramp shape (also used for the fade-out).
    pub fn with_ramp(mut self, ramp: Ramp) -> Self {
        self.ramp = ramp;
        self
    }

    pub fn activations(&self) -> u64 {
        self.activations
    }

    /// Service wake-ups until `shutdown` resolves.
    ///
    /// `shutdown` is only polled while IDLE, so a request that arrives during
    /// an activation takes effect once both workers are reaped.
    pub async fn run<B, S>(
        &mut self,
        mux: &mut Multiplexer<B>,
        shutdown: S,
    ) -> Result<(), DaemonError>
    where
        B: EdgeSource,
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(
            button = mux.has_button(),
            timer = mux.has_timer(),
            pwm = self.actuator.is_some(),
            "*** READY ***"
        );

        loop {
            let wakeup = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                wakeup = mux.wait() => wakeup?,
            };

            let Some(trigger) = wakeup.trigger() else {
                debug!(?wakeup, "no activation");
                continue;
            };

            match self.activate(trigger).await {
                Ok(report) => info!(
                    sequence = report.sequence,
                    probe_pid = report.probe_pid,
                    pulse = report.pulse_ran,
                    fade_writes = report.fade_writes,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "activation complete"
                ),
                Err(e) => error!("activation aborted: {e}"),
            }
        }

        if let Some(duty) = self.actuator.as_mut() {
            if let Err(e) = duty.park() {
                warn!("parking PWM on shutdown: {e}");
            }
        }
        Ok(())
    }

    /// Run one complete activation.
    ///
    /// # Errors
    /// Only a probe spawn failure is returned; nothing is left running in
    /// that case.  Later failures are logged and reflected in the report.
    pub async fn activate(&mut self, trigger: Trigger) -> Result<ActivationReport, WorkerError> {
        let started_at = Instant::now();

        let probe = self.launcher.launch(&self.command)?;
        let probe_pid = probe.pid();
        info!(?trigger, "Pinging on PID {probe_pid}");

        let pulse = match self.actuator.as_ref() {
            Some(output) => match PulseWorker::spawn(output, self.ramp) {
                Ok(worker) => {
                    info!("Pulsing PWM indicator");
                    Some(worker)
                }
                Err(e) => {
                    warn!("no visual feedback for this activation: {e}");
                    None
                }
            },
            None => None,
        };

        self.activations += 1;
        let activation = Activation {
            sequence: self.activations,
            trigger,
            probe,
            probe_pid,
            pulse,
            started_at,
        };

        tokio::time::sleep(self.window).await;
        Ok(self.finish(activation).await)
    }

    /// Terminate the probe first so the LED visibly outlasts it, then stop
    /// the pulse and fade the duty back to zero.
    async fn finish(&mut self, activation: Activation<L::Probe>) -> ActivationReport {
        let Activation {
            sequence,
            trigger,
            probe,
            probe_pid,
            pulse,
            started_at,
        } = activation;

        let probe_exit = match probe.terminate().await {
            Ok(exit) => {
                debug_assert_eq!(exit.pid, probe_pid, "reaped a different PID");
                debug!(pid = exit.pid, code = ?exit.code, signal = ?exit.signal, "probe reaped");
                Some(exit)
            }
            Err(e) => {
                warn!("probe PID {probe_pid}: {e}");
                None
            }
        };

        let pulse_ran = pulse.is_some();
        let mut fade_writes = 0;
        if let Some(worker) = pulse {
            if let Err(e) = worker.stop().await {
                warn!("{e}");
            }
            if let Some(duty) = self.actuator.as_mut() {
                fade_writes = fade_out(duty, &self.ramp).await;
            }
        }

        ActivationReport {
            sequence,
            trigger,
            probe_pid,
            probe_exit,
            pulse_ran,
            fade_writes,
            elapsed: started_at.elapsed(),
        }
    }
}

/// Step the duty down from wherever the pulse left it, then park at `"0"`.
///
/// Returns the number of percent writes made before parking.
async fn fade_out<A: DutyCycle>(duty: &mut A, ramp: &Ramp) -> usize {
    let mut percent = match duty.read_count() {
        Ok(count) => count_to_percent(count, duty.period_count()),
        Err(e) => {
            warn!("fade-out: {e}");
            0.0
        }
    };

    let mut writes = 0;
    while percent >= 0.0 {
        if let Err(e) = duty.set_duty(percent) {
            warn!("fade-out: {e}");
            break;
        }
        writes += 1;
        tokio::time::sleep(ramp.fall_dwell).await;
        percent -= ramp.step;
    }

    if let Err(e) = duty.park() {
        warn!("fade-out: {e}");
    }
    writes
}

// ── Tests ─────────────────────────────────────────────────────────────────────
