//! Materialize missing per-service configuration files.

use crate::error::{Error, Result};
use crate::service::{BatchReport, ServiceDescriptor, ServiceReport};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// Left untouched.
    AlreadyPresent,
    CreatedFromTemplate,
    CreatedFromDefault,
    /// Neither a template nor a built-in default exists. Not fatal.
    MissingTemplate,
}

impl fmt::Display for ProvisionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionOutcome::AlreadyPresent => write!(f, "already present"),
            ProvisionOutcome::CreatedFromTemplate => write!(f, "created from template"),
            ProvisionOutcome::CreatedFromDefault => write!(f, "created with defaults"),
            ProvisionOutcome::MissingTemplate => write!(f, "no template, not created"),
        }
    }
}

pub struct EnvironmentProvisioner {
    logs_dir: PathBuf,
}

impl EnvironmentProvisioner {
    pub fn new(logs_dir: impl Into<PathBuf>) -> Self {
        Self {
            logs_dir: logs_dir.into(),
        }
    }

    /// Provision every service. A failure for one service is recorded and
    /// the others are still processed.
    pub fn provision_all(&self, services: &[ServiceDescriptor]) -> Result<BatchReport<ProvisionOutcome>> {
        fs::create_dir_all(&self.logs_dir).map_err(|e| {
            Error::Filesystem(format!(
                "Cannot create logs directory '{}': {}",
                self.logs_dir.display(),
                e
            ))
        })?;

        let results = services
            .iter()
            .map(|service| ServiceReport {
                service: service.name.clone(),
                result: self.provision(service),
            })
            .collect();
        Ok(BatchReport {
            operation: "provision",
            results,
        })
    }

    /// Create the service's configuration file if it is absent. An existing
    /// file is never modified.
    pub fn provision(&self, service: &ServiceDescriptor) -> Result<ProvisionOutcome> {
        if service.config_path.exists() {
            tracing::debug!(
                "'{}': {} already present",
                service.name,
                service.config_path.display()
            );
            return Ok(ProvisionOutcome::AlreadyPresent);
        }

        let (contents, outcome) = if service.template_path.is_file() {
            let template = fs::read_to_string(&service.template_path).map_err(|e| {
                Error::Filesystem(format!(
                    "Cannot read template '{}': {}",
                    service.template_path.display(),
                    e
                ))
            })?;
            (template, ProvisionOutcome::CreatedFromTemplate)
        } else if let Some(settings) = &service.default_settings {
            let rendered = settings
                .iter()
                .map(|(k, v)| format!("{}={}\n", k, v))
                .collect::<String>();
            (rendered, ProvisionOutcome::CreatedFromDefault)
        } else {
            tracing::warn!(
                "'{}': no {} to create {} from",
                service.name,
                service.template_path.display(),
                service.config_path.display()
            );
            return Ok(ProvisionOutcome::MissingTemplate);
        };

        if !create_new(&service.config_path, &contents)? {
            return Ok(ProvisionOutcome::AlreadyPresent);
        }
        tracing::info!(
            "'{}': created {} ({})",
            service.name,
            service.config_path.display(),
            outcome
        );
        Ok(outcome)
    }
}

/// Write `contents` to a file that must not exist yet. Returns false if it
/// appeared in the meantime.
fn create_new(path: &Path, contents: &str) -> Result<bool> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => {
            return Err(Error::Filesystem(format!(
                "Cannot create '{}': {}",
                path.display(),
                e
            )))
        }
    };
    file.write_all(contents.as_bytes())?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::service::{KnownService, ServiceDescriptor};

    fn service(root: &Path, which: KnownService) -> ServiceDescriptor {
        ServiceDescriptor::resolve(which, &Config::default(), root)
    }

    #[test]
    fn template_is_copied() {
        let dir = tempfile::tempdir().unwrap();
        let backend = service(dir.path(), KnownService::Backend);
        fs::create_dir_all(&backend.working_directory).unwrap();
        fs::write(&backend.template_path, "# db\nPOSTGRES_PASSWORD=\n").unwrap();

        let provisioner = EnvironmentProvisioner::new(dir.path().join("logs"));
        assert_eq!(
            provisioner.provision(&backend).unwrap(),
            ProvisionOutcome::CreatedFromTemplate
        );
        assert_eq!(
            fs::read_to_string(&backend.config_path).unwrap(),
            "# db\nPOSTGRES_PASSWORD=\n"
        );
    }

    #[test]
    fn existing_file_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let backend = service(dir.path(), KnownService::Backend);
        fs::create_dir_all(&backend.working_directory).unwrap();
        fs::write(&backend.template_path, "A=template\n").unwrap();
        fs::write(&backend.config_path, "A=mine\n").unwrap();

        let provisioner = EnvironmentProvisioner::new(dir.path().join("logs"));
        assert_eq!(
            provisioner.provision(&backend).unwrap(),
            ProvisionOutcome::AlreadyPresent
        );
        assert_eq!(fs::read_to_string(&backend.config_path).unwrap(), "A=mine\n");
    }

    #[test]
    fn frontend_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let frontend = service(dir.path(), KnownService::Frontend);

        let provisioner = EnvironmentProvisioner::new(dir.path().join("logs"));
        assert_eq!(
            provisioner.provision(&frontend).unwrap(),
            ProvisionOutcome::CreatedFromDefault
        );
        assert_eq!(
            fs::read_to_string(&frontend.config_path).unwrap(),
            "API_BASE_URL=http://localhost:8000\n"
        );
    }

    #[test]
    fn missing_template_does_not_stop_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let sync = service(dir.path(), KnownService::Sync);
        let frontend = service(dir.path(), KnownService::Frontend);

        let provisioner = EnvironmentProvisioner::new(dir.path().join("logs"));
        let report = provisioner.provision_all(&[sync.clone(), frontend]).unwrap();
        assert!(!report.has_failures());
        assert!(matches!(
            report.results[0].result,
            Ok(ProvisionOutcome::MissingTemplate)
        ));
        assert!(matches!(
            report.results[1].result,
            Ok(ProvisionOutcome::CreatedFromDefault)
        ));
        assert!(!sync.config_path.exists());
        assert!(dir.path().join("logs").is_dir());
    }
}
