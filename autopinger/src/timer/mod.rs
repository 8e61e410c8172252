/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Periodic activation source backed by a Linux `timerfd`.
//!
//! The kernel keeps a 64-bit expiration counter.  One `read` returns and
//! resets it, so any number of expirations that pile up while the supervisor
//! is busy collapse into a single wake-up.

use std::fs::File;
use std::io::{self, Read};
use std::os::fd::{FromRawFd, OwnedFd};
use std::time::Duration;

use thiserror::Error;
use tokio::io::unix::AsyncFd;
use tracing::debug;

// ── Error type ────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum TimerError {
    #[error("timerfd_create failed: {0}")]
    Create(#[source] io::Error),

    #[error("timerfd_settime failed: {0}")]
    Arm(#[source] io::Error),

    #[error("interval must be non-zero")]
    ZeroInterval,

    #[error("cannot register timer handle: {0}")]
    Register(#[source] io::Error),

    #[error("reading timer expirations failed: {0}")]
    Read(#[source] io::Error),
}

fn timespec(d: Duration) -> libc::timespec {
    // Some targets carry padding fields, so start from zero.
    // SAFETY: timespec is plain old data.
    let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
    ts.tv_sec = d.as_secs() as libc::time_t;
    ts.tv_nsec = d.subsec_nanos() as _;
    ts
}

// ── IntervalTimer ─────────────────────────────────────────────────────────────

/// An armed, non-blocking `timerfd` registered with the reactor.
#[derive(Debug)]
pub struct IntervalTimer {
    fd: AsyncFd<File>,
}

impl IntervalTimer {
    /// Create a monotonic timer that first fires after `initial` and then
    /// every `interval`.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn arm(initial: Duration, interval: Duration) -> Result<Self, TimerError> {
        if interval.is_zero() {
            return Err(TimerError::ZeroInterval);
        }

        // SAFETY: plain syscall, the returned descriptor is checked below.
        let raw = unsafe {
            libc::timerfd_create(
                libc::CLOCK_MONOTONIC,
                libc::TFD_NONBLOCK | libc::TFD_CLOEXEC,
            )
        };
        if raw < 0 {
            return Err(TimerError::Create(io::Error::last_os_error()));
        }
        // SAFETY: `raw` is a freshly created descriptor owned by nobody else.
        let owned = unsafe { OwnedFd::from_raw_fd(raw) };

        // A zero it_value would disarm the timer.
        let first = if initial.is_zero() {
            Duration::from_nanos(1)
        } else {
            initial
        };
        let spec = libc::itimerspec {
            it_interval: timespec(interval),
            it_value: timespec(first),
        };
        // SAFETY: `spec` outlives the call; old-value pointer may be null.
        let rc = unsafe { libc::timerfd_settime(raw, 0, &spec, std::ptr::null_mut()) };
        if rc < 0 {
            return Err(TimerError::Arm(io::Error::last_os_error()));
        }

        let fd = AsyncFd::new(File::from(owned)).map_err(TimerError::Register)?;
        debug!(?initial, ?interval, "interval timer armed");
        Ok(Self { fd })
    }

    /// Wait until at least one expiration is pending, then drain the counter.
    ///
    /// Returns the number of expirations absorbed by this read.
    pub async fn expirations(&mut self) -> Result<u64, TimerError> {
        loop {
            let mut guard = self.fd.readable().await.map_err(TimerError::Read)?;
            match guard.try_io(|inner| read_counter(inner.get_ref())) {
                Ok(result) => return result.map_err(TimerError::Read),
                // Readiness was stale; try_io already cleared it.
                Err(_would_block) => continue,
            }
        }
    }
}

/// One 8-byte read of the expiration counter (host byte order).
fn read_counter(mut file: &File) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    file.read_exact(&mut buf)?;
    Ok(u64::from_ne_bytes(buf))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
