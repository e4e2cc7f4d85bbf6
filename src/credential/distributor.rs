//! Fan a validated credential out to the credential store and to every
//! service configuration file that holds it.
//!
//! The three steps are exposed separately so callers (and tests) can drive
//! them one at a time:
//!
//! 1. [`CredentialDistributor::validate`] probes the database. A failure
//!    returns [`Error::ConnectionFailed`] and nothing on disk is touched.
//! 2. [`CredentialDistributor::apply`] backs up and upserts the store, then
//!    upserts one key per consumer file.
//! 3. [`CredentialDistributor::verify`] probes again using only what was
//!    written, the way each consumer would read it.

use super::{backup_store, CredentialKey, CredentialRecord, CredentialStore, Secret};
use crate::config::{ConfigFile, SchemaObject};
use crate::error::{Error, Result};
use crate::probe::{ConnectivityProbe, ConnectivityResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings a consumer may use to point at a different server than the record.
const HOST_KEY: &str = "POSTGRES_HOST";
const PORT_KEY: &str = "POSTGRES_PORT";
const DATABASE_KEY: &str = "POSTGRES_DB";
const USER_KEY: &str = "POSTGRES_USER";

/// A service configuration file that receives the secret under `key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerTarget {
    pub service: String,
    pub path: PathBuf,
    pub key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerOutcome {
    Updated,
    /// The file already held exactly this value; it was not rewritten.
    Unchanged,
    /// No file to update. Run provisioning first.
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerUpdate {
    pub target: ConsumerTarget,
    pub outcome: ConsumerOutcome,
}

/// One end-to-end probe made from distributed artifacts only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndToEndCheck {
    /// `credential store` or the consumer's service name.
    pub source: String,
    /// The identity that was probed, when one could be assembled.
    pub key: Option<CredentialKey>,
    pub result: ConnectivityResult,
}

impl EndToEndCheck {
    fn unusable(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            key: None,
            result: ConnectivityResult::failed(Duration::ZERO, reason),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DistributionReport {
    pub key: CredentialKey,
    pub validation: ConnectivityResult,
    pub store_path: PathBuf,
    pub backup: Option<PathBuf>,
    pub consumers: Vec<ConsumerUpdate>,
    pub end_to_end: Vec<EndToEndCheck>,
}

impl DistributionReport {
    pub fn end_to_end_ok(&self) -> bool {
        self.end_to_end.iter().all(|c| c.result.success)
    }

    pub fn schema_object_missing(&self) -> bool {
        self.validation.schema_object_missing()
    }
}

pub struct CredentialDistributor<'a, P: ConnectivityProbe + ?Sized> {
    probe: &'a P,
    store_path: PathBuf,
    consumers: Vec<ConsumerTarget>,
    schema_object: Option<SchemaObject>,
}

impl<'a, P: ConnectivityProbe + ?Sized> CredentialDistributor<'a, P> {
    pub fn new(probe: &'a P, store_path: PathBuf, consumers: Vec<ConsumerTarget>) -> Self {
        Self {
            probe,
            store_path,
            consumers,
            schema_object: None,
        }
    }

    /// Also check for this table during validation.
    pub fn with_schema_object(mut self, schema_object: Option<SchemaObject>) -> Self {
        self.schema_object = schema_object;
        self
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Probe `record`. Expected failures become `ConnectionFailed`.
    pub async fn validate(&self, record: &CredentialRecord) -> Result<ConnectivityResult> {
        let result = self
            .probe
            .check(record, self.schema_object.as_ref())
            .await;
        if !result.success {
            let reason = result
                .failure
                .as_deref()
                .map(|r| record.secret.redact(r))
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(Error::ConnectionFailed {
                target: record.key().to_string(),
                reason,
            });
        }
        tracing::info!(
            "Validated {} in {:?}",
            record.key(),
            result.latency
        );
        Ok(result)
    }

    /// Write `record` to the store and to every consumer.
    ///
    /// Pre: `record` has been validated. Post: the store holds exactly one
    /// entry for the record's key, with mode 0600, and each existing consumer
    /// file holds the secret under its key with every other line untouched.
    pub fn apply(&self, record: &CredentialRecord) -> Result<(Option<PathBuf>, Vec<ConsumerUpdate>)> {
        let store = CredentialStore::load(&self.store_path)?;
        let backup = backup_store(&self.store_path)?;
        store.upsert(record).save(&self.store_path)?;
        tracing::info!(
            "Stored credential for {} in {}",
            record.key(),
            self.store_path.display()
        );

        let mut updates = Vec::with_capacity(self.consumers.len());
        for target in &self.consumers {
            let outcome = update_consumer(target, &record.secret)?;
            updates.push(ConsumerUpdate {
                target: target.clone(),
                outcome,
            });
        }
        Ok((backup, updates))
    }

    /// Probe again, reading the secret back from each written artifact.
    pub async fn verify(
        &self,
        record: &CredentialRecord,
        updates: &[ConsumerUpdate],
    ) -> Result<Vec<EndToEndCheck>> {
        let mut checks = Vec::with_capacity(updates.len() + 1);

        let key = record.key();
        let store = CredentialStore::load(&self.store_path)?;
        checks.push(match store.lookup(&key) {
            Some(secret) => {
                let from_store = key.clone().with_secret(secret);
                let mut result = self.probe.check(&from_store, None).await;
                result.failure = result
                    .failure
                    .map(|f| record.secret.redact(&from_store.secret.redact(&f)));
                EndToEndCheck {
                    source: "credential store".to_string(),
                    key: Some(key.clone()),
                    result,
                }
            }
            None => EndToEndCheck::unusable(
                "credential store",
                format!("no entry for {}", key),
            ),
        });

        for update in updates {
            if update.outcome == ConsumerOutcome::Missing {
                continue;
            }
            let target = &update.target;
            let check = match consumer_record(target, &key) {
                Ok(consumer) => {
                    let mut result = self.probe.check(&consumer, None).await;
                    result.failure = result.failure.map(|f| consumer.secret.redact(&f));
                    EndToEndCheck {
                        source: target.service.clone(),
                        key: Some(consumer.key()),
                        result,
                    }
                }
                Err(reason) => EndToEndCheck::unusable(target.service.clone(), reason),
            };
            checks.push(check);
        }

        for check in checks.iter().filter(|c| !c.result.success) {
            tracing::warn!(
                "End-to-end check via {} failed: {}",
                check.source,
                check.result.failure.as_deref().unwrap_or("unknown error")
            );
        }
        Ok(checks)
    }

    /// Validate, apply and verify.
    pub async fn distribute(&self, record: &CredentialRecord) -> Result<DistributionReport> {
        let validation = self.validate(record).await?;
        let (backup, consumers) = self.apply(record)?;
        let end_to_end = self.verify(record, &consumers).await?;
        Ok(DistributionReport {
            key: record.key(),
            validation,
            store_path: self.store_path.clone(),
            backup,
            consumers,
            end_to_end,
        })
    }
}

fn update_consumer(target: &ConsumerTarget, secret: &Secret) -> Result<ConsumerOutcome> {
    if !target.path.exists() {
        tracing::warn!(
            "Skipping '{}': {} does not exist",
            target.service,
            target.path.display()
        );
        return Ok(ConsumerOutcome::Missing);
    }

    let file = ConfigFile::load(&target.path)?;
    let occurrences = file.keys().filter(|k| *k == target.key).count();
    if occurrences == 1 && file.get(&target.key) == Some(secret.expose()) {
        return Ok(ConsumerOutcome::Unchanged);
    }

    file.with_value(&target.key, secret.expose()).save()?;
    tracing::info!(
        "Updated {} for '{}' in {}",
        target.key,
        target.service,
        target.path.display()
    );
    Ok(ConsumerOutcome::Updated)
}

/// The identity a consumer ends up with after its dotenv reader loads the file.
/// Errors are already safe to show.
pub(crate) fn consumer_record(
    target: &ConsumerTarget,
    default: &CredentialKey,
) -> std::result::Result<CredentialRecord, String> {
    let iter = dotenvy::from_path_iter(&target.path)
        .map_err(|e| format!("cannot read {}: {}", target.path.display(), e))?;
    let mut values = HashMap::new();
    for item in iter {
        // Parse errors can quote the offending line, which may be the secret.
        let (k, v) = item.map_err(|_| {
            format!("{} is not readable as a dotenv file", target.path.display())
        })?;
        values.insert(k, v);
    }

    let secret = values
        .get(&target.key)
        .cloned()
        .ok_or_else(|| format!("{} has no {}", target.path.display(), target.key))?;
    let port = match values.get(PORT_KEY) {
        Some(p) => p
            .trim()
            .parse::<u16>()
            .map_err(|_| format!("{}={} is not a port", PORT_KEY, p))?,
        None => default.port,
    };
    let field = |name: &str, fallback: &str| {
        values
            .get(name)
            .cloned()
            .unwrap_or_else(|| fallback.to_string())
    };

    Ok(CredentialRecord {
        host: field(HOST_KEY, &default.host),
        port,
        database: field(DATABASE_KEY, &default.database),
        user: field(USER_KEY, &default.user),
        secret: Secret::new(secret),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ConnectivityProbe;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Accepts exactly one secret and records every identity it was asked about.
    struct FakeProbe {
        accepted: &'static str,
        seen: Mutex<Vec<CredentialKey>>,
    }

    impl FakeProbe {
        fn accepting(secret: &'static str) -> Self {
            Self {
                accepted: secret,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ConnectivityProbe for FakeProbe {
        async fn check(
            &self,
            record: &CredentialRecord,
            schema_object: Option<&SchemaObject>,
        ) -> ConnectivityResult {
            self.seen.lock().unwrap().push(record.key());
            if record.secret.expose() == self.accepted {
                ConnectivityResult::connected(Duration::from_millis(1), schema_object.map(|_| true))
            } else {
                ConnectivityResult::failed(
                    Duration::from_millis(1),
                    format!("password authentication failed ({})", record.secret.expose()),
                )
            }
        }

        async fn initialize_schema(&self, _record: &CredentialRecord, _script: &str) -> Result<()> {
            Ok(())
        }
    }

    fn record(secret: &str) -> CredentialRecord {
        CredentialRecord {
            host: "127.0.0.1".to_string(),
            port: 5432,
            database: "app".to_string(),
            user: "reader".to_string(),
            secret: Secret::new(secret),
        }
    }

    #[tokio::test]
    async fn failed_validation_is_redacted_and_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join(".pgpass");
        let probe = FakeProbe::accepting("right");
        let distributor = CredentialDistributor::new(&probe, store.clone(), vec![]);

        let err = distributor.distribute(&record("wrong")).await.unwrap_err();
        match err {
            Error::ConnectionFailed { reason, .. } => {
                assert!(!reason.contains("wrong"));
                assert!(reason.contains("***"));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(!store.exists());
    }

    #[tokio::test]
    async fn consumer_overrides_are_honoured_in_verification() {
        let dir = tempfile::tempdir().unwrap();
        let env = dir.path().join(".env");
        std::fs::write(&env, "POSTGRES_HOST=db.internal\nPOSTGRES_USER=app_user\n").unwrap();
        let probe = FakeProbe::accepting("pw");
        let distributor = CredentialDistributor::new(
            &probe,
            dir.path().join(".pgpass"),
            vec![ConsumerTarget {
                service: "backend".to_string(),
                path: env,
                key: "POSTGRES_PASSWORD".to_string(),
            }],
        );

        let report = distributor.distribute(&record("pw")).await.unwrap();
        assert!(report.end_to_end_ok());
        let backend = &report.end_to_end[1];
        assert_eq!(backend.source, "backend");
        let key = backend.key.as_ref().unwrap();
        assert_eq!(key.host, "db.internal");
        assert_eq!(key.user, "app_user");
        assert_eq!(key.database, "app");
    }

    #[tokio::test]
    async fn bad_port_in_consumer_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let env = dir.path().join(".env");
        std::fs::write(&env, "POSTGRES_PORT=fivefourthreetwo\n").unwrap();
        let probe = FakeProbe::accepting("pw");
        let distributor = CredentialDistributor::new(
            &probe,
            dir.path().join(".pgpass"),
            vec![ConsumerTarget {
                service: "sync".to_string(),
                path: env,
                key: "POSTGRES_PASSWORD".to_string(),
            }],
        );

        let report = distributor.distribute(&record("pw")).await.unwrap();
        assert!(!report.end_to_end_ok());
        assert!(report.end_to_end[0].result.success);
        assert!(report.end_to_end[1]
            .result
            .failure
            .as_deref()
            .unwrap()
            .contains("POSTGRES_PORT"));
    }

    #[test]
    fn unchanged_consumer_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "POSTGRES_PASSWORD=pw\n").unwrap();
        let target = ConsumerTarget {
            service: "backend".to_string(),
            path: path.clone(),
            key: "POSTGRES_PASSWORD".to_string(),
        };
        assert_eq!(
            update_consumer(&target, &Secret::new("pw")).unwrap(),
            ConsumerOutcome::Unchanged
        );
        assert_eq!(
            update_consumer(&target, &Secret::new("new")).unwrap(),
            ConsumerOutcome::Updated
        );
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "POSTGRES_PASSWORD=new\n"
        );
    }

    #[tokio::test]
    async fn shadowed_store_entry_fails_and_is_logged() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join(".pgpass");
        // libpq picks the first match, so the wildcard line hides ours.
        std::fs::write(&store, "*:*:*:reader:shadowed-pw\n").unwrap();
        let probe = FakeProbe::accepting("pw");
        let distributor = CredentialDistributor::new(&probe, store, vec![]);
        let logs = crate::test_support::CapturedLogs::default();
        let _guard = logs.install();

        let report = distributor.distribute(&record("pw")).await.unwrap();
        assert!(!report.end_to_end_ok());
        let failure = report.end_to_end[0].result.failure.clone().unwrap();
        assert!(!failure.contains("shadowed-pw"), "{}", failure);

        let captured = logs.contents();
        assert!(captured.contains("End-to-end check via credential store failed"), "{}", captured);
        assert!(!captured.contains("shadowed-pw"), "{}", captured);
    }
}
