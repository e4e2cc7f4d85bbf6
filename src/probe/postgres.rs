use super::{ConnectivityProbe, ConnectivityResult};
use crate::config::SchemaObject;
use crate::credential::CredentialRecord;
use crate::error::{Error, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use std::time::{Duration, Instant};

/// Upper bound for running the initialization script once connected.
const SCRIPT_TIMEOUT: Duration = Duration::from_secs(60);

const TABLE_EXISTS_SQL: &str = "SELECT EXISTS (\
     SELECT 1 FROM information_schema.tables \
     WHERE table_schema = $1 AND table_name = $2)";

/// Probe backed by a single `sqlx` PostgreSQL connection.
pub struct PostgresProbe {
    timeout: Duration,
}

impl PostgresProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn options(record: &CredentialRecord) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&record.host)
            .port(record.port)
            .database(&record.database)
            .username(&record.user)
            .password(record.secret.expose())
    }

    async fn connect(&self, record: &CredentialRecord) -> std::result::Result<PgConnection, String> {
        match tokio::time::timeout(self.timeout, PgConnection::connect_with(&Self::options(record)))
            .await
        {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => Err(record.secret.redact(&e.to_string())),
            Err(_) => Err(format!("timed out after {:?}", self.timeout)),
        }
    }
}

#[async_trait]
impl ConnectivityProbe for PostgresProbe {
    #[tracing::instrument(skip(self, record), fields(target = %record.key()))]
    async fn check(
        &self,
        record: &CredentialRecord,
        schema_object: Option<&SchemaObject>,
    ) -> ConnectivityResult {
        let started = Instant::now();

        let mut conn = match self.connect(record).await {
            Ok(conn) => conn,
            Err(reason) => {
                tracing::debug!("Connection failed: {}", reason);
                return ConnectivityResult::failed(started.elapsed(), reason);
            }
        };

        let queries = async {
            sqlx::query_scalar::<_, i32>("SELECT 1")
                .fetch_one(&mut conn)
                .await?;
            let present = match schema_object {
                Some(obj) => Some(
                    sqlx::query_scalar::<_, bool>(TABLE_EXISTS_SQL)
                        .bind(&obj.schema)
                        .bind(&obj.table)
                        .fetch_one(&mut conn)
                        .await?,
                ),
                None => None,
            };
            Ok::<_, sqlx::Error>(present)
        };

        let remaining = self.timeout.saturating_sub(started.elapsed());
        let result = match tokio::time::timeout(remaining, queries).await {
            Ok(Ok(present)) => ConnectivityResult::connected(started.elapsed(), present),
            Ok(Err(e)) => {
                ConnectivityResult::failed(started.elapsed(), record.secret.redact(&e.to_string()))
            }
            Err(_) => ConnectivityResult::failed(
                started.elapsed(),
                format!("query timed out after {:?}", self.timeout),
            ),
        };

        if let Err(e) = conn.close().await {
            tracing::debug!("Error closing probe connection: {}", e);
        }
        result
    }

    #[tracing::instrument(skip(self, record, script), fields(target = %record.key()))]
    async fn initialize_schema(&self, record: &CredentialRecord, script: &str) -> Result<()> {
        let fail = |reason: String| Error::SchemaInitFailed {
            user: record.user.clone(),
            reason,
        };

        let mut conn = self.connect(record).await.map_err(fail)?;
        let outcome = tokio::time::timeout(SCRIPT_TIMEOUT, sqlx::Executor::execute(&mut conn, sqlx::raw_sql(script)))
            .await;
        if let Err(e) = conn.close().await {
            tracing::debug!("Error closing initialization connection: {}", e);
        }

        match outcome {
            Ok(Ok(_)) => {
                tracing::info!("Schema initialization script completed");
                Ok(())
            }
            Ok(Err(e)) => Err(fail(record.secret.redact(&e.to_string()))),
            Err(_) => Err(fail(format!("script timed out after {:?}", SCRIPT_TIMEOUT))),
        }
    }
}
