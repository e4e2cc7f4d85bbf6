use crate::error::{Error, Result};
use crate::files::{remove_if_exists, write_atomic};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::Path;

/// A launched service process, as recorded in its pid file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessHandle {
    pub service_name: String,
    pub pid: u32,
    /// When the pid file was written.
    pub start_time: DateTime<Utc>,
}

/// What was found at a service's pid path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleFile {
    Missing,
    Valid(ProcessHandle),
    /// The file exists but does not hold a pid.
    Corrupt(String),
}

impl ProcessHandle {
    pub fn read(service_name: &str, path: &Path) -> Result<HandleFile> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HandleFile::Missing),
            Err(e) => {
                return Err(Error::Filesystem(format!(
                    "Cannot read pid file '{}': {}",
                    path.display(),
                    e
                )))
            }
        };

        let Ok(pid) = content.trim().parse::<u32>() else {
            return Ok(HandleFile::Corrupt(content.trim().to_string()));
        };

        let start_time = fs::metadata(path)
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        Ok(HandleFile::Valid(ProcessHandle {
            service_name: service_name.to_string(),
            pid,
            start_time,
        }))
    }

    /// Persist `pid` for `service_name`, creating the logs directory if needed.
    pub fn write(service_name: &str, pid: u32, path: &Path) -> Result<ProcessHandle> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_atomic(path, &format!("{}\n", pid), None)?;
        tracing::debug!("Wrote pid {} for '{}' to {}", pid, service_name, path.display());
        Ok(ProcessHandle {
            service_name: service_name.to_string(),
            pid,
            start_time: Utc::now(),
        })
    }

    pub fn remove(path: &Path) -> Result<()> {
        remove_if_exists(path)
    }
}
