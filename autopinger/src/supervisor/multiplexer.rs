/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Readiness multiplexer over the enabled event sources.
//!
//! Sources are registered once at startup and never removed.  When several
//! are ready at the same time the button is always serviced first; the
//! other source stays ready and is picked up on the next call.

use std::future::pending;

use tracing::{debug, warn};

use crate::error::DaemonError;
use crate::gpio::{ButtonEdge, Edge, EdgeSource, GpioError};
use crate::timer::{IntervalTimer, TimerError};

/// Which source caused an activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Button { gpio: u32 },
    Timer { expirations: u64 },
}

/// One drained readiness notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wakeup {
    Button { gpio: u32, edge: Edge },
    Timer { expirations: u64 },
}

impl Wakeup {
    /// `Some` when this wake-up should start an activation.
    pub fn trigger(self) -> Option<Trigger> {
        match self {
            Wakeup::Button {
                gpio,
                edge: Edge::Press,
            } => Some(Trigger::Button { gpio }),
            Wakeup::Button { .. } => None,
            Wakeup::Timer { expirations: 0 } => None,
            Wakeup::Timer { expirations } => Some(Trigger::Timer { expirations }),
        }
    }
}

/// Owns the registered source handles.
#[derive(Debug)]
pub struct Multiplexer<B = ButtonEdge> {
    button: Option<B>,
    timer: Option<IntervalTimer>,
}

async fn next_edge<B: EdgeSource>(button: Option<&mut B>) -> Result<Edge, GpioError> {
    match button {
        Some(b) => b.next_edge().await,
        None => pending().await,
    }
}

async fn next_expirations(timer: Option<&mut IntervalTimer>) -> Result<u64, TimerError> {
    match timer {
        Some(t) => t.expirations().await,
        None => pending().await,
    }
}

impl<B: EdgeSource> Multiplexer<B> {
    pub fn new(button: Option<B>, timer: Option<IntervalTimer>) -> Self {
        Self { button, timer }
    }

    pub fn has_button(&self) -> bool {
        self.button.is_some()
    }

    pub fn has_timer(&self) -> bool {
        self.timer.is_some()
    }

    /// Block until a source is ready and drain its payload.
    ///
    /// A failed `value` read or counter read is logged and reported as a
    /// non-activating wake-up.
    ///
    /// # Errors
    /// [`DaemonError::UnknownReadiness`] if no source is registered, or a
    /// button error if the reactor can no longer wait on the handle.
    pub async fn wait(&mut self) -> Result<Wakeup, DaemonError> {
        let button_armed = self.button.is_some();
        let timer_armed = self.timer.is_some();
        let gpio = self.button.as_ref().map_or(0, |b| b.gpio());

        tokio::select! {
            biased;

            edge = next_edge(self.button.as_mut()), if button_armed => match edge {
                Ok(edge) => Ok(Wakeup::Button { gpio, edge }),
                Err(GpioError::Read { gpio, source }) => {
                    warn!(gpio, "reading button value failed: {source}");
                    Ok(Wakeup::Button { gpio, edge: Edge::Other })
                }
                Err(e) => Err(e.into()),
            },

            n = next_expirations(self.timer.as_mut()), if timer_armed => match n {
                Ok(expirations) => {
                    if expirations > 1 {
                        debug!(expirations, "timer backlog absorbed");
                    }
                    Ok(Wakeup::Timer { expirations })
                }
                Err(e) => {
                    warn!("{e}");
                    Ok(Wakeup::Timer { expirations: 0 })
                }
            },

            else => Err(DaemonError::UnknownReadiness),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
