use super::handle::{HandleFile, ProcessHandle};
use super::process::{LaunchSpec, ProcessControl};
use super::types::{transition, ServiceState};
use super::ServiceDescriptor;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started { pid: u32 },
    /// A live process was already recorded; nothing was launched.
    AlreadyRunning { pid: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// SIGTERM was sent and the handle removed. Exit is not awaited.
    Stopped { pid: u32 },
    NotRunning,
    /// The handle pointed at a dead process (or held no pid) and was removed.
    Stale { pid: Option<u32> },
}

impl fmt::Display for StartOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartOutcome::Started { pid } => write!(f, "started (pid {})", pid),
            StartOutcome::AlreadyRunning { pid } => write!(f, "already running (pid {})", pid),
        }
    }
}

impl fmt::Display for StopOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopOutcome::Stopped { pid } => write!(f, "stopped (pid {})", pid),
            StopOutcome::NotRunning => write!(f, "not running"),
            StopOutcome::Stale { pid: Some(pid) } => {
                write!(f, "stale pid file removed (pid {} was not alive)", pid)
            }
            StopOutcome::Stale { pid: None } => write!(f, "unreadable pid file removed"),
        }
    }
}

/// Read-only view of one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub service: String,
    /// `not_started`, `running` or `stale`.
    pub state: ServiceState,
    pub pid: Option<u32>,
    pub since: Option<DateTime<Utc>>,
    pub port: u16,
}

#[derive(Debug)]
pub struct ServiceReport<T> {
    pub service: String,
    pub result: Result<T>,
}

/// Per-service results of a batch operation, in the order attempted.
#[derive(Debug)]
pub struct BatchReport<T> {
    pub operation: &'static str,
    pub results: Vec<ServiceReport<T>>,
}

impl<T> BatchReport<T> {
    pub fn failed(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| r.result.is_err())
            .map(|r| r.service.as_str())
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        self.results.iter().any(|r| r.result.is_err())
    }

    /// `PartialBatchFailure` naming every failed service, if any failed.
    pub fn failure(&self) -> Option<Error> {
        if !self.has_failures() {
            return None;
        }
        Some(Error::PartialBatchFailure {
            operation: self.operation.to_string(),
            failed: self.failed().into_iter().map(String::from).collect(),
        })
    }
}

/// Starts, stops and inspects services through a [`ProcessControl`].
pub struct LifecycleManager<C: ProcessControl> {
    control: C,
}

impl<C: ProcessControl> LifecycleManager<C> {
    pub fn new(control: C) -> Self {
        Self { control }
    }

    pub fn control(&self) -> &C {
        &self.control
    }

    #[tracing::instrument(skip(self, service), fields(service.name = %service.name))]
    pub async fn start(&self, service: &ServiceDescriptor) -> Result<StartOutcome> {
        match ProcessHandle::read(&service.name, &service.pid_path)? {
            HandleFile::Valid(handle) if self.control.is_alive(handle.pid).await => {
                tracing::info!("'{}' is already running (pid {})", service.name, handle.pid);
                return Ok(StartOutcome::AlreadyRunning { pid: handle.pid });
            }
            HandleFile::Valid(handle) => {
                transition(&service.name, ServiceState::Running, ServiceState::Stale);
                tracing::info!(
                    "Removing stale pid file for '{}' (pid {} is not alive)",
                    service.name,
                    handle.pid
                );
                ProcessHandle::remove(&service.pid_path)?;
            }
            HandleFile::Corrupt(content) => {
                tracing::warn!(
                    "Removing unreadable pid file for '{}' ({:?})",
                    service.name,
                    content
                );
                ProcessHandle::remove(&service.pid_path)?;
            }
            HandleFile::Missing => {}
        }

        if !service.runtime_env.exists() {
            return Err(Error::DependencyMissing {
                service: service.name.clone(),
                path: service.runtime_env.clone(),
            });
        }

        transition(&service.name, ServiceState::NotStarted, ServiceState::Starting);
        let spec = LaunchSpec {
            service: service.name.clone(),
            command: service.start_command.clone(),
            working_directory: service.working_directory.clone(),
            log_path: service.log_path.clone(),
        };
        let pid = match self.control.spawn_detached(&spec).await {
            Ok(pid) => pid,
            Err(e) => {
                transition(&service.name, ServiceState::Starting, ServiceState::NotStarted);
                return Err(e);
            }
        };

        if let Err(e) = ProcessHandle::write(&service.name, pid, &service.pid_path) {
            // An untracked process could never be stopped by us.
            if let Err(signal_err) = self.control.terminate(pid, &service.name).await {
                tracing::warn!(
                    "'{}' (pid {}) could not be recorded or stopped and may still be running: {}",
                    service.name,
                    pid,
                    signal_err
                );
            }
            transition(&service.name, ServiceState::Starting, ServiceState::NotStarted);
            return Err(e);
        }

        transition(&service.name, ServiceState::Starting, ServiceState::Running);
        tracing::info!(
            "Started '{}' (pid {}, port {}), logging to {}",
            service.name,
            pid,
            service.listen_port,
            service.log_path.display()
        );
        Ok(StartOutcome::Started { pid })
    }

    #[tracing::instrument(skip(self, service), fields(service.name = %service.name))]
    pub async fn stop(&self, service: &ServiceDescriptor) -> Result<StopOutcome> {
        let handle = match ProcessHandle::read(&service.name, &service.pid_path)? {
            HandleFile::Missing => return Ok(StopOutcome::NotRunning),
            HandleFile::Corrupt(_) => {
                ProcessHandle::remove(&service.pid_path)?;
                return Ok(StopOutcome::Stale { pid: None });
            }
            HandleFile::Valid(handle) => handle,
        };

        if !self.control.is_alive(handle.pid).await {
            transition(&service.name, ServiceState::Running, ServiceState::Stale);
            ProcessHandle::remove(&service.pid_path)?;
            transition(&service.name, ServiceState::Stale, ServiceState::Stopped);
            tracing::info!(
                "'{}' was not running (stale pid {}), pid file removed",
                service.name,
                handle.pid
            );
            return Ok(StopOutcome::Stale {
                pid: Some(handle.pid),
            });
        }

        transition(&service.name, ServiceState::Running, ServiceState::Stopping);
        match self.control.terminate(handle.pid, &service.name).await {
            Ok(()) => {}
            Err(e @ Error::InvalidPid { .. }) => {
                // The recorded pid can never be signalled; drop it.
                ProcessHandle::remove(&service.pid_path)?;
                return Err(e);
            }
            Err(e) => return Err(e),
        }
        ProcessHandle::remove(&service.pid_path)?;
        transition(&service.name, ServiceState::Stopping, ServiceState::Stopped);
        tracing::info!("Sent SIGTERM to '{}' (pid {})", service.name, handle.pid);
        Ok(StopOutcome::Stopped { pid: handle.pid })
    }

    /// Status without side effects: stale handles are reported, not removed.
    pub async fn status(&self, service: &ServiceDescriptor) -> Result<ServiceStatus> {
        let (state, pid, since) = match ProcessHandle::read(&service.name, &service.pid_path)? {
            HandleFile::Missing => (ServiceState::NotStarted, None, None),
            HandleFile::Corrupt(_) => (ServiceState::Stale, None, None),
            HandleFile::Valid(handle) => {
                if self.control.is_alive(handle.pid).await {
                    (
                        ServiceState::Running,
                        Some(handle.pid),
                        Some(handle.start_time),
                    )
                } else {
                    (ServiceState::Stale, Some(handle.pid), None)
                }
            }
        };
        Ok(ServiceStatus {
            service: service.name.clone(),
            state,
            pid,
            since,
            port: service.listen_port,
        })
    }

    /// Start every service in order. A failure is recorded and the next
    /// service is still attempted.
    pub async fn start_all(&self, services: &[ServiceDescriptor]) -> BatchReport<StartOutcome> {
        let mut results = Vec::with_capacity(services.len());
        for service in services {
            let result = self.start(service).await;
            if let Err(e) = &result {
                tracing::warn!("Failed to start '{}': {}", service.name, e);
            }
            results.push(ServiceReport {
                service: service.name.clone(),
                result,
            });
        }
        BatchReport {
            operation: "start",
            results,
        }
    }

    /// Stop every service in reverse order.
    pub async fn stop_all(&self, services: &[ServiceDescriptor]) -> BatchReport<StopOutcome> {
        let mut results = Vec::with_capacity(services.len());
        for service in services.iter().rev() {
            let result = self.stop(service).await;
            if let Err(e) = &result {
                tracing::warn!("Failed to stop '{}': {}", service.name, e);
            }
            results.push(ServiceReport {
                service: service.name.clone(),
                result,
            });
        }
        BatchReport {
            operation: "stop",
            results,
        }
    }
}

/// Last `lines` lines of a service's log.
pub fn tail_log(service: &ServiceDescriptor, lines: usize) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(&service.log_path).map_err(|e| {
        Error::Filesystem(format!(
            "Cannot read log for '{}' at {}: {}",
            service.name,
            service.log_path.display(),
            e
        ))
    })?;
    let all: Vec<&str> = content.lines().collect();
    let skip = all.len().saturating_sub(lines);
    Ok(all[skip..].iter().map(|l| l.to_string()).collect())
}
