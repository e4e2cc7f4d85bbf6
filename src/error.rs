// thiserror's expansion of struct variants trips this lint.
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    #[diagnostic(code(svcp::config::error))]
    Config(String),

    #[error("Invalid configuration: {0}")]
    #[diagnostic(
        code(svcp::config::validation),
        help("Check the sections of your svcp.yaml against the documented keys")
    )]
    Validation(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Filesystem error: {0}")]
    #[diagnostic(code(svcp::filesystem::error))]
    Filesystem(String),

    #[error("Unknown service: {0}")]
    #[diagnostic(
        code(svcp::service::unknown),
        help("Known services are: sync, backend, frontend (or 'all')")
    )]
    UnknownService(String),

    #[error("No template for '{service}': {} does not exist", .template.display())]
    #[diagnostic(
        code(svcp::provision::missing_template),
        help("Add the template to the service directory, or create the file by hand")
    )]
    MissingTemplate { service: String, template: PathBuf },

    #[error("Connection to {target} failed: {reason}")]
    #[diagnostic(
        code(svcp::database::connection_failed),
        help("Check that PostgreSQL is running, the host/port are reachable and the password is correct")
    )]
    ConnectionFailed { target: String, reason: String },

    #[error("Schema initialization as '{user}' failed: {reason}")]
    #[diagnostic(code(svcp::database::schema_init_failed))]
    SchemaInitFailed { user: String, reason: String },

    #[error("Service '{service}' cannot start: runtime environment {} is missing", .path.display())]
    #[diagnostic(
        code(svcp::service::dependency_missing),
        help("Create the service's virtual environment and install its dependencies first")
    )]
    DependencyMissing { service: String, path: PathBuf },

    #[error("Service '{0}' failed to start: {1}")]
    #[diagnostic(
        code(svcp::service::start_failed),
        help("Check the service logs with `svcp logs {0}`\nVerify the command exists and is executable")
    )]
    ServiceStartFailed(String, String),

    #[error("Invalid PID {pid}: {reason}")]
    InvalidPid { pid: u32, reason: String },

    #[error("Cannot signal '{service}' (pid {pid}): {reason}")]
    #[diagnostic(code(svcp::service::signal_failed))]
    SignalFailed {
        service: String,
        pid: u32,
        reason: String,
    },

    #[error("{operation} failed for: {}", .failed.join(", "))]
    #[diagnostic(code(svcp::batch::partial_failure))]
    PartialBatchFailure {
        operation: String,
        failed: Vec<String>,
    },

    #[error("Cannot prompt for {0}: not running in an interactive terminal")]
    #[diagnostic(
        code(svcp::prompt::non_interactive),
        help("Pass the secret on standard input with --password-stdin")
    )]
    NonInteractive(String),

    #[error("Operation aborted by user")]
    Aborted,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns a helpful suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Error::UnknownService(_) => {
                Some("Use one of: sync, backend, frontend, or 'all'.".to_string())
            }
            Error::MissingTemplate { template, .. } => Some(format!(
                "Create {} (or the service's .env) and run `svcp provision` again.",
                template.display()
            )),
            Error::ConnectionFailed { .. } => Some(
                "Nothing was written. Verify the credential with `svcp probe` once the database is reachable."
                    .to_string(),
            ),
            Error::DependencyMissing { service, path } => Some(format!(
                "Create the environment for '{}' (e.g. `python3 -m venv {}`) and install its requirements.",
                service,
                path.display()
            )),
            Error::ServiceStartFailed(service, _) => {
                Some(format!("Check the service logs with: svcp logs {}", service))
            }
            Error::PartialBatchFailure { .. } => Some(
                "The other services were still processed. Fix the failures above and re-run the command."
                    .to_string(),
            ),
            Error::Config(_) | Error::Validation(_) | Error::Yaml(_) => {
                Some("Check svcp.yaml, or pass another file with --config.".to_string())
            }
            Error::NonInteractive(_) => {
                Some("Pipe the secret in and pass --password-stdin.".to_string())
            }
            _ => None,
        }
    }

    /// Formats the error with its suggestion (if any) for user-friendly display.
    pub fn with_suggestion(&self) -> String {
        match self.suggestion() {
            Some(suggestion) => format!("{}\n\nHint: {}", self, suggestion),
            None => self.to_string(),
        }
    }
}

/// Validates and converts a u32 PID to nix::unistd::Pid safely.
/// Returns Err for PID 0 (process group), PID 1 (init), or values > i32::MAX.
pub fn validate_pid(pid: u32, service_name: &str) -> Result<nix::unistd::Pid> {
    if pid == 0 {
        return Err(Error::InvalidPid {
            pid,
            reason: format!(
                "PID 0 is invalid for service '{}' (refers to process group, not a process)",
                service_name
            ),
        });
    }
    if pid == 1 {
        return Err(Error::InvalidPid {
            pid,
            reason: format!(
                "refusing to operate on PID 1 (init) for service '{}'",
                service_name
            ),
        });
    }
    let raw = i32::try_from(pid).map_err(|_| Error::InvalidPid {
        pid,
        reason: format!(
            "PID {} exceeds i32::MAX for service '{}', cannot convert safely",
            pid, service_name
        ),
    })?;
    Ok(nix::unistd::Pid::from_raw(raw))
}

/// Same as validate_pid but without the PID 1 refusal.
/// Use validate_pid for signal operations; use this for read-only checks.
pub fn validate_pid_for_check(pid: u32) -> Option<nix::unistd::Pid> {
    if pid == 0 {
        return None;
    }
    i32::try_from(pid).ok().map(nix::unistd::Pid::from_raw)
}
