//! Database connectivity checks.
//!
//! [`ConnectivityProbe`] is the seam between the orchestration logic and the
//! database driver: the distributor and the setup workflow only see
//! [`ConnectivityResult`] values, and tests swap in fakes.

mod postgres;

pub use postgres::PostgresProbe;

use crate::config::SchemaObject;
use crate::credential::CredentialRecord;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Outcome of one probe. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivityResult {
    pub success: bool,
    pub latency: Duration,
    /// `None` when no schema object was asked for or the connection failed.
    pub schema_object_present: Option<bool>,
    /// Why the connection failed, with the secret redacted.
    pub failure: Option<String>,
}

impl ConnectivityResult {
    pub fn connected(latency: Duration, schema_object_present: Option<bool>) -> Self {
        Self {
            success: true,
            latency,
            schema_object_present,
            failure: None,
        }
    }

    pub fn failed(latency: Duration, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            latency,
            schema_object_present: None,
            failure: Some(reason.into()),
        }
    }

    /// True when the connection worked and the schema object is known to be missing.
    pub fn schema_object_missing(&self) -> bool {
        self.success && self.schema_object_present == Some(false)
    }
}

#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// Connect as `record`, run a trivial read and optionally check `schema_object`.
    ///
    /// Expected connectivity problems (bad password, unreachable host, timeout)
    /// are reported through the result, never as `Err` or a panic.
    async fn check(
        &self,
        record: &CredentialRecord,
        schema_object: Option<&SchemaObject>,
    ) -> ConnectivityResult;

    /// Run a DDL script as `record`.
    async fn initialize_schema(&self, record: &CredentialRecord, script: &str) -> Result<()>;
}
