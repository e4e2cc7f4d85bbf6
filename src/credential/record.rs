use super::Secret;
use std::fmt;

/// One database identity together with its secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub secret: Secret,
}

impl CredentialRecord {
    pub fn key(&self) -> CredentialKey {
        CredentialKey {
            host: self.host.clone(),
            port: self.port,
            database: self.database.clone(),
            user: self.user.clone(),
        }
    }
}

/// The `(host, port, database, user)` tuple a credential store entry is keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CredentialKey {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
}

impl CredentialKey {
    pub fn with_secret(self, secret: Secret) -> CredentialRecord {
        CredentialRecord {
            host: self.host,
            port: self.port,
            database: self.database,
            user: self.user,
            secret,
        }
    }
}

impl fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}/{} as {}",
            self.host, self.port, self.database, self.user
        )
    }
}
