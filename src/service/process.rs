use crate::error::{validate_pid, validate_pid_for_check, Error, Result};
use async_trait::async_trait;
use nix::sys::signal::{self, killpg, Signal};
use std::borrow::Cow;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio::process::Command;

/// How long the detach wrapper may take to report the service's pid.
const PID_READ_TIMEOUT: Duration = Duration::from_secs(3);

/// Everything needed to launch one service process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub service: String,
    /// Shell command, run by bash in `working_directory`.
    pub command: String,
    pub working_directory: PathBuf,
    /// Receives stdout and stderr, appended.
    pub log_path: PathBuf,
}

/// The OS boundary of the lifecycle manager.
#[async_trait]
pub trait ProcessControl: Send + Sync {
    /// Launch `spec` detached from this process and return its pid.
    /// Returns as soon as the pid is known; readiness is not awaited.
    async fn spawn_detached(&self, spec: &LaunchSpec) -> Result<u32>;

    /// Non-destructive existence check.
    async fn is_alive(&self, pid: u32) -> bool;

    /// Ask the process to exit. Does not wait for it.
    async fn terminate(&self, pid: u32, service: &str) -> Result<()>;
}

/// [`ProcessControl`] backed by bash, `nohup` and POSIX signals.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessControl;

impl SystemProcessControl {
    /// The wrapper script. The inner bash prints its own pid, moves its
    /// output to the log and then runs the service command, so the pid we
    /// read is the long-running process and not the wrapper.
    fn wrapper_script(spec: &LaunchSpec) -> String {
        let log = shell_escape::escape(spec.log_path.to_string_lossy());
        let inner = format!("echo $$; exec 1>> {} 2>&1; {}", log, spec.command);
        format!("nohup bash -c {} &", shell_escape::escape(Cow::from(inner)))
    }

    fn process_group(pid: nix::unistd::Pid) -> Option<nix::unistd::Pid> {
        match nix::unistd::getpgid(Some(pid)) {
            Ok(pgid) if pgid.as_raw() > 1 => Some(pgid),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("getpgid({}) failed: {}", pid, e);
                None
            }
        }
    }
}

#[async_trait]
impl ProcessControl for SystemProcessControl {
    async fn spawn_detached(&self, spec: &LaunchSpec) -> Result<u32> {
        let start_failed = |reason: String| Error::ServiceStartFailed(spec.service.clone(), reason);

        if let Some(parent) = spec.log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Touch the log so it exists even if the command never writes.
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&spec.log_path)
            .map_err(|e| {
                start_failed(format!(
                    "cannot open log file {}: {}",
                    spec.log_path.display(),
                    e
                ))
            })?;

        // The command comes from trusted configuration and is handed to bash
        // unescaped; only the assembled script is quoted for the outer shell.
        let script = Self::wrapper_script(spec);
        tracing::debug!(
            "Spawning '{}' in {:?}: {}",
            spec.service,
            spec.working_directory,
            spec.command
        );

        let mut child = Command::new("/bin/bash")
            .arg("-c")
            .arg(&script)
            .current_dir(&spec.working_directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(false)
            .process_group(0)
            .spawn()
            .map_err(|e| {
                tracing::error!(
                    "Failed to spawn '{}' (work_dir: {:?}): {}",
                    spec.service,
                    spec.working_directory,
                    e
                );
                start_failed(e.to_string())
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| start_failed("wrapper stdout was not captured".to_string()))?;
        let mut reader = tokio::io::BufReader::new(stdout);
        let mut line = String::new();
        let read = tokio::time::timeout(PID_READ_TIMEOUT, reader.read_line(&mut line)).await;

        // Reap the wrapper; the service itself has been handed to init.
        let _ = child.wait().await;

        match read {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(start_failed(format!("cannot read pid: {}", e))),
            Err(_) => {
                return Err(start_failed(format!(
                    "no pid reported within {:?}",
                    PID_READ_TIMEOUT
                )))
            }
        }

        let pid = line
            .trim()
            .parse::<u32>()
            .map_err(|_| start_failed(format!("unexpected pid output '{}'", line.trim())))?;
        validate_pid(pid, &spec.service)?;
        tracing::debug!("Captured pid {} for '{}'", pid, spec.service);
        Ok(pid)
    }

    async fn is_alive(&self, pid: u32) -> bool {
        let Some(nix_pid) = validate_pid_for_check(pid) else {
            return false;
        };
        if signal::kill(nix_pid, None).is_err() {
            return false;
        }

        // An unreaped zombie still answers signal 0.
        #[cfg(target_os = "linux")]
        if let Ok(status) = tokio::fs::read_to_string(format!("/proc/{}/status", pid)).await {
            if let Some(state) = status
                .lines()
                .find(|l| l.starts_with("State:"))
                .and_then(|l| l["State:".len()..].chars().find(|c| c.is_alphabetic()))
            {
                return !matches!(state, 'Z' | 'T' | 'X' | 'x');
            }
        }

        true
    }

    async fn terminate(&self, pid: u32, service: &str) -> Result<()> {
        let nix_pid = validate_pid(pid, service)?;

        // Never signal our own group.
        let own_group = nix::unistd::getpgrp();
        let sent = match Self::process_group(nix_pid).filter(|g| *g != own_group) {
            Some(pgid) => killpg(pgid, Signal::SIGTERM).or_else(|e| {
                tracing::debug!(
                    "killpg({}) failed for '{}': {}, signalling pid {}",
                    pgid,
                    service,
                    e,
                    pid
                );
                signal::kill(nix_pid, Signal::SIGTERM)
            }),
            None => signal::kill(nix_pid, Signal::SIGTERM),
        };

        sent.map_err(|e| Error::SignalFailed {
            service: service.to_string(),
            pid,
            reason: e.to_string(),
        })
    }
}
