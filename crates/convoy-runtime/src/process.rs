//! Host process control for the process backend.
//!
//! A service's `command` is spawned as a child process with stdout and
//! stderr appended to its log file. Stopping sends SIGTERM, then SIGKILL
//! once the grace period runs out.

use std::fs::File;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use convoy_common::error::{ConvoyError, Result};
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Spawns `command` with `env`, logging to `log`. Returns the child's PID.
///
/// The child is reaped by a background thread so it never lingers as a
/// zombie.
///
/// # Errors
///
/// Returns an error if the command is empty or cannot be spawned.
pub fn spawn_service_process(command: &[String], env: &[(String, String)], log: &File) -> Result<u32> {
    let (program, args) = command.split_first().ok_or_else(|| ConvoyError::Config {
        message: "service has no command to run".into(),
    })?;

    let stdout = log.try_clone().map_err(|e| backend_io("log handle", &e))?;
    let stderr = log.try_clone().map_err(|e| backend_io("log handle", &e))?;

    let mut child = Command::new(program)
        .args(args)
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .spawn()
        .map_err(|e| backend_io(program, &e))?;

    let pid = child.id();
    tracing::info!(pid, program = %program, "spawned service process");

    let reaper = std::thread::Builder::new()
        .name(format!("convoy-reap-{pid}"))
        .spawn(move || match child.wait() {
            Ok(status) => tracing::debug!(pid, %status, "service process exited"),
            Err(e) => tracing::warn!(pid, error = %e, "failed to wait for service process"),
        });
    drop(reaper.map_err(|e| backend_io("reaper thread", &e))?);

    Ok(pid)
}

/// Returns whether a process with this PID exists.
#[must_use]
pub fn is_alive(pid: u32) -> bool {
    to_pid(pid).is_ok_and(|pid| kill(pid, None).is_ok())
}

/// Sends SIGTERM and escalates to SIGKILL after `grace`.
///
/// A process that is already gone counts as stopped.
///
/// # Errors
///
/// Returns an error if the process cannot be signalled.
pub fn terminate(pid: u32, grace: Duration) -> Result<()> {
    if !signal(pid, Signal::SIGTERM)? {
        return Ok(());
    }
    tracing::debug!(pid, "sent SIGTERM");

    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        if !is_alive(pid) {
            return Ok(());
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    if signal(pid, Signal::SIGKILL)? {
        tracing::info!(pid, "grace period expired, sent SIGKILL");
    }
    Ok(())
}

/// Sends SIGKILL.
///
/// # Errors
///
/// Returns an error if the process cannot be signalled.
pub fn kill_process(pid: u32) -> Result<()> {
    let _ = signal(pid, Signal::SIGKILL)?;
    Ok(())
}

/// Returns `false` when the process no longer exists.
fn signal(pid: u32, sig: Signal) -> Result<bool> {
    match kill(to_pid(pid)?, sig) {
        Ok(()) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(e) => Err(ConvoyError::Backend {
            message: format!("failed to send {sig} to {pid}: {e}"),
        }),
    }
}

fn to_pid(pid: u32) -> Result<Pid> {
    i32::try_from(pid)
        .map(Pid::from_raw)
        .map_err(|_| ConvoyError::Backend {
            message: format!("invalid pid {pid}"),
        })
}

fn backend_io(what: &str, e: &std::io::Error) -> ConvoyError {
    ConvoyError::Backend {
        message: format!("{what}: {e}"),
    }
}
