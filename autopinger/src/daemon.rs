/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Detaching into the background (`-d`).
//!
//! Must run before the tokio runtime or any other thread exists: after
//! `fork()` only the calling thread survives in the child.

use std::io;

use tracing::info;

use crate::error::DaemonError;

/// Fork, let the parent exit 0, and make the child a session leader.
///
/// Returns only in the child.
pub fn detach() -> Result<(), DaemonError> {
    // SAFETY: called from a single-threaded process before the runtime is
    // built, so the child inherits a consistent address space.
    let pid = unsafe { libc::fork() };
    if pid < 0 {
        return Err(DaemonError::Fork(io::Error::last_os_error()));
    }
    if pid > 0 {
        info!("Process forked to {pid}");
        std::process::exit(0);
    }

    // SAFETY: plain syscall with no arguments.
    if unsafe { libc::setsid() } < 0 {
        return Err(DaemonError::Session(io::Error::last_os_error()));
    }
    Ok(())
}

/// Resolves on the first SIGTERM or SIGINT.
///
/// The handlers are installed immediately, so a signal delivered before the
/// future is first polled is not lost.
pub fn shutdown_signal() -> io::Result<impl std::future::Future<Output = ()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM"),
            _ = sigint.recv()  => info!("received SIGINT"),
        }
    })
}
