/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Probe worker: one `ping` child per activation.
//!
//! The child inherits stdout/stderr, is never waited for naturally, and is
//! stopped with `SIGTERM` at the end of the active window.  Its `-c` count is
//! informational only; the window almost always cuts it short.

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{debug, warn};

use super::WorkerError;

// ── ProbeCommand ──────────────────────────────────────────────────────────────

/// Argument vector for the probe, resolved through `PATH` at spawn time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeCommand {
    program: String,
    args: Vec<String>,
}

impl ProbeCommand {
    /// `["ping", "-c <count>", <target>]` — the count and its flag share one
    /// argv slot.
    pub fn ping(program: impl Into<String>, count: u32, target: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: vec![format!("-c {count}"), target.into()],
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Full argv including `argv[0]`.
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }
}

// ── Probe traits ──────────────────────────────────────────────────────────────

/// How a terminated probe went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeExit {
    pub pid: u32,
    /// Exit code if the child exited on its own.
    pub code: Option<i32>,
    /// Terminating signal number if it was killed.
    pub signal: Option<i32>,
}

/// A running probe that can only be terminated and reaped.
#[allow(async_fn_in_trait)]
pub trait Probe {
    fn pid(&self) -> u32;

    /// Send `SIGTERM`, then block until the child is reaped.
    async fn terminate(self) -> Result<ProbeExit, WorkerError>;
}

/// Starts probes.  The supervisor is generic over this so tests can record
/// spawns instead of running `ping`.
pub trait ProbeLauncher {
    type Probe: Probe;

    fn launch(&mut self, command: &ProbeCommand) -> Result<Self::Probe, WorkerError>;
}

// ── Real process implementation ───────────────────────────────────────────────

/// Launches probes as OS child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLauncher;

impl ProbeLauncher for ProcessLauncher {
    type Probe = ChildProbe;

    fn launch(&mut self, command: &ProbeCommand) -> Result<ChildProbe, WorkerError> {
        let argv = command.argv();
        let child = Command::new(argv[0])
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| WorkerError::Spawn {
                program: command.program().to_string(),
                source,
            })?;
        let pid = child.id().ok_or_else(|| WorkerError::NoPid {
            program: command.program().to_string(),
        })?;
        debug!(pid, argv = ?argv, "probe spawned");
        Ok(ChildProbe { child, pid })
    }
}

/// A probe running as a real child process.
#[derive(Debug)]
pub struct ChildProbe {
    child: Child,
    pid: u32,
}

impl Probe for ChildProbe {
    fn pid(&self) -> u32 {
        self.pid
    }

    async fn terminate(self) -> Result<ProbeExit, WorkerError> {
        self.terminate_with(send_sigterm).await
    }
}

/// `kill(pid, SIGTERM)`; ESRCH means the child already exited and is only
/// waiting to be reaped.
fn send_sigterm(pid: u32) -> io::Result<()> {
    // SAFETY: `pid` belongs to a child we have not reaped yet, so it cannot
    // have been recycled for another process.
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            return Err(err);
        }
    }
    Ok(())
}

impl ChildProbe {
    /// Signal with `send`, then reap.
    ///
    /// If the signal cannot be delivered the child is force-killed and still
    /// reaped before the signal error is returned.
    async fn terminate_with<F>(mut self, send: F) -> Result<ProbeExit, WorkerError>
    where
        F: FnOnce(u32) -> io::Result<()>,
    {
        let pid = self.pid;
        if let Err(source) = send(pid) {
            warn!(pid, "SIGTERM failed ({source}), killing probe");
            let _ = self.child.start_kill();
            self.child
                .wait()
                .await
                .map_err(|source| WorkerError::Reap { pid, source })?;
            return Err(WorkerError::Signal {
                pid,
                signal: "SIGTERM",
                source,
            });
        }

        let status = self
            .child
            .wait()
            .await
            .map_err(|source| WorkerError::Reap { pid, source })?;
        Ok(ProbeExit {
            pid,
            code: status.code(),
            signal: status.signal(),
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_argv_keeps_count_in_one_slot() {
        let cmd = ProbeCommand::ping("ping", 30, "1.2.3.4");
        assert_eq!(cmd.argv(), vec!["ping", "-c 30", "1.2.3.4"]);
        assert_eq!(cmd.program(), "ping");
    }

    #[tokio::test]
    async fn terminate_sends_sigterm_and_reaps() {
        let mut launcher = ProcessLauncher;
        let cmd = ProbeCommand {
            program: "sleep".into(),
            args: vec!["30".into()],
        };
        let probe = launcher.launch(&cmd).unwrap();
        let pid = probe.pid();
        assert!(pid > 0);

        let exit = probe.terminate().await.unwrap();
        assert_eq!(exit.pid, pid);
        assert_eq!(exit.signal, Some(libc::SIGTERM));
        assert_eq!(exit.code, None);
    }

    #[tokio::test]
    async fn terminate_after_natural_exit_still_reaps() {
        let mut launcher = ProcessLauncher;
        let cmd = ProbeCommand {
            program: "true".into(),
            args: vec![],
        };
        let probe = launcher.launch(&cmd).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        let exit = probe.terminate().await.unwrap();
        assert_eq!(exit.code, Some(0));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let _guard = rt.enter();
        let mut launcher = ProcessLauncher;
        let cmd = ProbeCommand::ping("definitely-not-a-real-binary-xyz", 30, "127.0.0.1");
        let err = launcher.launch(&cmd).unwrap_err();
        assert!(matches!(err, WorkerError::Spawn { .. }));
    }

    #[tokio::test]
    async fn failed_signal_still_kills_and_reaps() {
        let mut launcher = ProcessLauncher;
        let cmd = ProbeCommand {
            program: "sleep".into(),
            args: vec!["30".into()],
        };
        let probe = launcher.launch(&cmd).unwrap();
        let pid = probe.pid();

        let err = probe
            .terminate_with(|_| Err(io::Error::from_raw_os_error(libc::EPERM)))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Signal { pid: p, .. } if p == pid));

        // Reaped: the PID no longer names a process.
        let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
        assert_eq!(rc, -1);
        assert_eq!(io::Error::last_os_error().raw_os_error(), Some(libc::ESRCH));
    }

    #[tokio::test]
    async fn dropped_probe_is_killed() {
        let mut launcher = ProcessLauncher;
        let cmd = ProbeCommand {
            program: "sleep".into(),
            args: vec!["30".into()],
        };
        let probe = launcher.launch(&cmd).unwrap();
        let pid = probe.pid() as libc::pid_t;
        drop(probe);

        // Either we reap the killed child here, or tokio's orphan reaper
        // already did (ECHILD).  0 means it is still running.
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        loop {
            let mut status = 0;
            if unsafe { libc::waitpid(pid, &mut status, libc::WNOHANG) } != 0 {
                break;
            }
            assert!(std::time::Instant::now() < deadline, "PID {pid} still alive");
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
    }
}
