//! A loaded deployment: the configuration plus the directory it applies to.

use crate::config::{expand_tilde, Config, Parser};
use crate::credential::{
    consumer_record, ConsumerTarget, CredentialDistributor, CredentialKey, CredentialRecord,
    CredentialStore,
};
use crate::error::{Error, Result};
use crate::probe::{ConnectivityProbe, PostgresProbe};
use crate::provision::EnvironmentProvisioner;
use crate::service::{self, KnownService, ServiceDescriptor};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Deployment {
    pub config: Config,
    pub work_dir: PathBuf,
    /// The file the configuration came from, if any.
    pub config_path: Option<PathBuf>,
}

impl Deployment {
    /// Load the configuration and settle the work directory.
    ///
    /// The config file is `config_path`, else `svcp.yaml` found in the work
    /// directory (or the current directory) and its parents; without one the
    /// built-in defaults apply. The work directory is `work_dir`, else the
    /// config file's directory, else the current directory.
    pub fn load(config_path: Option<&Path>, work_dir: Option<PathBuf>) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        let absolute = |p: &Path| if p.is_absolute() { p.to_path_buf() } else { cwd.join(p) };
        let work_dir = work_dir.map(|w| absolute(&w));

        let config_path = match config_path {
            Some(path) => {
                let path = absolute(path);
                if !path.is_file() {
                    return Err(Error::Config(format!(
                        "config file '{}' does not exist",
                        path.display()
                    )));
                }
                Some(path)
            }
            None => Parser::find_config_in_dir(work_dir.as_deref().unwrap_or(&cwd)),
        };

        let config = match &config_path {
            Some(path) => {
                tracing::debug!("Loading config from {}", path.display());
                Parser::new().load_config(path)?
            }
            None => {
                tracing::debug!("No config file found, using defaults");
                Config::default()
            }
        };

        let work_dir = work_dir
            .or_else(|| {
                config_path
                    .as_deref()
                    .and_then(Path::parent)
                    .map(Path::to_path_buf)
            })
            .unwrap_or(cwd);

        Ok(Self {
            config,
            work_dir,
            config_path,
        })
    }

    pub fn from_config(config: Config, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            work_dir: work_dir.into(),
            config_path: None,
        }
    }

    /// All known services in declared order.
    pub fn services(&self) -> Vec<ServiceDescriptor> {
        service::descriptors(&self.config, &self.work_dir)
    }

    /// A service name, alias or `all`.
    pub fn select(&self, target: &str) -> Result<Vec<ServiceDescriptor>> {
        service::select(&self.config, &self.work_dir, target)
    }

    pub fn service(&self, name: &str) -> Result<ServiceDescriptor> {
        let service =
            KnownService::from_name(name).ok_or_else(|| Error::UnknownService(name.to_string()))?;
        Ok(ServiceDescriptor::resolve(service, &self.config, &self.work_dir))
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.work_dir.join(&self.config.logs_dir)
    }

    pub fn credential_store_path(&self) -> PathBuf {
        self.resolve(&self.config.credential_store)
    }

    pub fn init_script_path(&self) -> PathBuf {
        self.resolve(&self.config.initialization.script)
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let expanded = expand_tilde(Path::new(path));
        if expanded.is_absolute() {
            expanded
        } else {
            self.work_dir.join(expanded)
        }
    }

    /// The consumer files that receive the distributed secret.
    pub fn consumers(&self) -> Result<Vec<ConsumerTarget>> {
        self.config
            .consumers
            .iter()
            .map(|consumer| {
                let descriptor = self.service(&consumer.service)?;
                Ok(ConsumerTarget {
                    service: descriptor.name,
                    path: descriptor.config_path,
                    key: consumer.key.clone(),
                })
            })
            .collect()
    }

    /// The identity the credential is distributed for and validated as.
    pub fn database_key(&self) -> CredentialKey {
        let db = &self.config.database;
        CredentialKey {
            host: db.host.clone(),
            port: db.port,
            database: db.name.clone(),
            user: db.user.clone(),
        }
    }

    /// The identity schema initialization runs as.
    pub fn initialization_key(&self) -> CredentialKey {
        CredentialKey {
            user: self.config.initialization.user.clone(),
            ..self.database_key()
        }
    }

    pub fn probe(&self) -> Result<PostgresProbe> {
        Ok(PostgresProbe::new(self.config.database.connect_timeout()?))
    }

    pub fn distributor<'a, P: ConnectivityProbe + ?Sized>(
        &self,
        probe: &'a P,
    ) -> Result<CredentialDistributor<'a, P>> {
        Ok(
            CredentialDistributor::new(probe, self.credential_store_path(), self.consumers()?)
                .with_schema_object(self.config.database.schema_object()?),
        )
    }

    pub fn provisioner(&self) -> EnvironmentProvisioner {
        EnvironmentProvisioner::new(self.logs_dir())
    }

    /// The identity a service would connect with, read from its configuration
    /// file. Falls back to the credential store when the file has no secret.
    pub fn service_credential(&self, name: &str) -> Result<CredentialRecord> {
        let descriptor = self.service(name)?;
        let key_name = self
            .config
            .consumers
            .iter()
            .find(|c| {
                KnownService::from_name(&c.service).is_some_and(|s| s.name() == descriptor.name)
            })
            .map(|c| c.key.clone())
            .unwrap_or_else(|| "POSTGRES_PASSWORD".to_string());
        let target = ConsumerTarget {
            service: descriptor.name.clone(),
            path: descriptor.config_path.clone(),
            key: key_name,
        };

        if !target.path.exists() {
            return Err(Error::Filesystem(format!(
                "'{}' has no configuration file at {}",
                descriptor.name,
                target.path.display()
            )));
        }

        match consumer_record(&target, &self.database_key()) {
            Ok(record) => Ok(record),
            Err(reason) => {
                let key = self.database_key();
                let secret = CredentialStore::load(&self.credential_store_path())?
                    .lookup(&key)
                    .ok_or(Error::Validation(reason))?;
                Ok(key.with_secret(secret))
            }
        }
    }
}
