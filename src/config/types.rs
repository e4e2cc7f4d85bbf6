//! Configuration types for `svcp.yaml`.
//!
//! Every section is optional; an absent file means [`Config::default`], which
//! describes the stock deployment (backend, frontend and sync service sharing
//! one PostgreSQL database).

use super::{parse_duration_string, validate_key};
use crate::error::{Error, Result};
use crate::service::KnownService;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Root configuration structure for svcp.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Identity and script used for the optional one-time schema initialization.
    #[serde(default)]
    pub initialization: InitializationConfig,

    /// Credential store (libpq passfile). `~` is expanded, relative paths are
    /// resolved against the work directory.
    #[serde(default = "default_credential_store")]
    pub credential_store: String,

    /// Service configuration files that receive the distributed secret.
    #[serde(default = "default_consumers")]
    pub consumers: Vec<Consumer>,

    /// Directory for log and pid files, relative to the work directory.
    #[serde(default = "default_logs_dir")]
    pub logs_dir: String,

    /// Per-service overrides keyed by service name.
    #[serde(default)]
    pub services: HashMap<String, ServiceOverride>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            initialization: InitializationConfig::default(),
            credential_store: default_credential_store(),
            consumers: default_consumers(),
            logs_dir: default_logs_dir(),
            services: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database")]
    pub name: String,
    /// Identity the distributed credential belongs to and is validated as.
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: String,
    /// Table whose presence is checked after a successful connection,
    /// written `schema.table`. `None` disables the check.
    #[serde(default = "default_schema_object")]
    pub schema_object: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            name: default_database(),
            user: default_user(),
            connect_timeout: default_connect_timeout(),
            schema_object: default_schema_object(),
        }
    }
}

impl DatabaseConfig {
    pub fn connect_timeout(&self) -> Result<Duration> {
        parse_duration_string(&self.connect_timeout).ok_or_else(|| {
            Error::Validation(format!(
                "database.connect_timeout '{}' is not a duration (use e.g. \"5s\" or \"500ms\")",
                self.connect_timeout
            ))
        })
    }

    pub fn schema_object(&self) -> Result<Option<SchemaObject>> {
        self.schema_object
            .as_deref()
            .map(SchemaObject::parse)
            .transpose()
    }
}

/// The identity used for schema initialization.
///
/// Separate from [`DatabaseConfig::user`]: the stock deployment validates as
/// one role and initializes as another.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InitializationConfig {
    #[serde(default = "default_init_user")]
    pub user: String,
    /// DDL script, relative to the work directory.
    #[serde(default = "default_init_script")]
    pub script: String,
}

impl Default for InitializationConfig {
    fn default() -> Self {
        Self {
            user: default_init_user(),
            script: default_init_script(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Consumer {
    pub service: String,
    #[serde(default = "default_consumer_key")]
    pub key: String,
}

/// Overrides for a known service. Ports are fixed and cannot be overridden.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceOverride {
    /// Working directory, relative to the work directory.
    pub cwd: Option<String>,
    /// Shell command started in the working directory.
    pub command: Option<String>,
    /// Runtime environment that must exist before start, relative to `cwd`.
    pub runtime_env: Option<String>,
}

/// A `schema.table` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaObject {
    pub schema: String,
    pub table: String,
}

impl SchemaObject {
    /// Parses `schema.table`; a bare `table` lives in `public`.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        let (schema, table) = match value.split_once('.') {
            Some((schema, table)) => (schema, table),
            None => ("public", value),
        };
        if schema.is_empty() || table.is_empty() || table.contains('.') {
            return Err(Error::Validation(format!(
                "schema object '{}' must be written as schema.table",
                value
            )));
        }
        Ok(Self {
            schema: schema.to_string(),
            table: table.to_string(),
        })
    }
}

impl fmt::Display for SchemaObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

impl Config {
    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        for name in self.services.keys() {
            if KnownService::from_name(name).is_none() {
                return Err(Error::Validation(format!(
                    "services.{}: not a known service (expected sync, backend or frontend)",
                    name
                )));
            }
        }

        for consumer in &self.consumers {
            if KnownService::from_name(&consumer.service).is_none() {
                return Err(Error::Validation(format!(
                    "consumers: '{}' is not a known service",
                    consumer.service
                )));
            }
            validate_key(&consumer.key)?;
        }

        if self.database.host.trim().is_empty() {
            return Err(Error::Validation("database.host cannot be empty".to_string()));
        }
        if self.database.user.trim().is_empty() || self.initialization.user.trim().is_empty() {
            return Err(Error::Validation(
                "database.user and initialization.user cannot be empty".to_string(),
            ));
        }
        if self.credential_store.trim().is_empty() {
            return Err(Error::Validation(
                "credential_store cannot be empty".to_string(),
            ));
        }

        self.database.connect_timeout()?;
        self.database.schema_object()?;
        Ok(())
    }

    /// Override for a service, looked up by canonical name.
    pub fn service_override(&self, service: KnownService) -> Option<&ServiceOverride> {
        self.services
            .iter()
            .find(|(name, _)| KnownService::from_name(name) == Some(service))
            .map(|(_, o)| o)
    }
}

fn default_credential_store() -> String {
    "~/.pgpass".to_string()
}

fn default_consumers() -> Vec<Consumer> {
    vec![
        Consumer {
            service: KnownService::Backend.name().to_string(),
            key: default_consumer_key(),
        },
        Consumer {
            service: KnownService::Sync.name().to_string(),
            key: default_consumer_key(),
        },
    ]
}

fn default_consumer_key() -> String {
    "POSTGRES_PASSWORD".to_string()
}

fn default_logs_dir() -> String {
    "logs".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_database() -> String {
    "eficiencia_energetica".to_string()
}

fn default_user() -> String {
    "api_crud_monitoreo_sedes_telemetria".to_string()
}

fn default_connect_timeout() -> String {
    "5s".to_string()
}

fn default_schema_object() -> Option<String> {
    Some("monitoreo_equipos.mantenimientos".to_string())
}

fn default_init_user() -> String {
    "api_crud_monitoreo_equipos".to_string()
}

fn default_init_script() -> String {
    "database/init_mantenimientos.sql".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.consumers.len(), 2);
        assert_eq!(
            config.database.connect_timeout().unwrap(),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn validation_and_initialization_identities_differ_by_default() {
        let config = Config::default();
        assert_ne!(config.database.user, config.initialization.user);
    }

    #[test]
    fn schema_object_parsing() {
        let obj = SchemaObject::parse("monitoreo_equipos.mantenimientos").unwrap();
        assert_eq!(obj.schema, "monitoreo_equipos");
        assert_eq!(obj.table, "mantenimientos");

        let bare = SchemaObject::parse("devices").unwrap();
        assert_eq!(bare.to_string(), "public.devices");

        assert!(SchemaObject::parse("a.b.c").is_err());
        assert!(SchemaObject::parse(".table").is_err());
    }

    #[test]
    fn unknown_service_override_is_rejected() {
        let mut config = Config::default();
        config
            .services
            .insert("worker".to_string(), ServiceOverride::default());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("worker"));
    }

    #[test]
    fn consumer_with_invalid_key_is_rejected() {
        let mut config = Config::default();
        config.consumers.push(Consumer {
            service: "frontend".to_string(),
            key: "NOT A KEY".to_string(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let mut config = Config::default();
        config.database.connect_timeout = "eventually".to_string();
        assert!(matches!(config.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn override_lookup_accepts_aliases() {
        let mut config = Config::default();
        config.services.insert(
            "api".to_string(),
            ServiceOverride {
                command: Some("sleep 1".to_string()),
                ..Default::default()
            },
        );
        let o = config.service_override(KnownService::Backend).unwrap();
        assert_eq!(o.command.as_deref(), Some("sleep 1"));
        assert!(config.service_override(KnownService::Frontend).is_none());
    }
}
