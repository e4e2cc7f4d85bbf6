//! Shared fakes for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use service_provisioner::config::SchemaObject;
use service_provisioner::credential::{CredentialKey, CredentialRecord, Secret};
use service_provisioner::probe::{ConnectivityProbe, ConnectivityResult};
use service_provisioner::prompt::Prompter;
use service_provisioner::{Error, Result};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// A database that accepts exactly one password for every identity.
pub struct FakeProbe {
    pub accepted: String,
    pub schema_present: bool,
    pub checks: Mutex<Vec<CredentialKey>>,
    pub initialized: Mutex<Vec<(CredentialKey, String)>>,
}

impl FakeProbe {
    pub fn accepting(secret: &str) -> Self {
        Self {
            accepted: secret.to_string(),
            schema_present: true,
            checks: Mutex::new(Vec::new()),
            initialized: Mutex::new(Vec::new()),
        }
    }

    pub fn without_schema(mut self) -> Self {
        self.schema_present = false;
        self
    }

    pub fn check_count(&self) -> usize {
        self.checks.lock().unwrap().len()
    }
}

#[async_trait]
impl ConnectivityProbe for FakeProbe {
    async fn check(
        &self,
        record: &CredentialRecord,
        schema_object: Option<&SchemaObject>,
    ) -> ConnectivityResult {
        self.checks.lock().unwrap().push(record.key());
        if record.secret.expose() == self.accepted {
            ConnectivityResult::connected(
                Duration::from_millis(2),
                schema_object.map(|_| self.schema_present),
            )
        } else {
            ConnectivityResult::failed(
                Duration::from_millis(2),
                format!("password authentication failed for user \"{}\"", record.user),
            )
        }
    }

    async fn initialize_schema(&self, record: &CredentialRecord, script: &str) -> Result<()> {
        if record.secret.expose() != self.accepted {
            return Err(Error::SchemaInitFailed {
                user: record.user.clone(),
                reason: "password authentication failed".to_string(),
            });
        }
        self.initialized
            .lock()
            .unwrap()
            .push((record.key(), script.to_string()));
        Ok(())
    }
}

/// Answers prompts from a script, in order.
#[derive(Default)]
pub struct ScriptedPrompter {
    pub confirms: Mutex<VecDeque<bool>>,
    pub secrets: Mutex<VecDeque<String>>,
    pub asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new(confirms: &[bool], secrets: &[&str]) -> Self {
        Self {
            confirms: Mutex::new(confirms.iter().copied().collect()),
            secrets: Mutex::new(secrets.iter().map(|s| s.to_string()).collect()),
            asked: Mutex::new(Vec::new()),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, question: &str, default: bool) -> Result<bool> {
        self.asked.lock().unwrap().push(question.to_string());
        Ok(self.confirms.lock().unwrap().pop_front().unwrap_or(default))
    }

    fn secret(&self, label: &str) -> Result<Secret> {
        self.asked.lock().unwrap().push(label.to_string());
        self.secrets
            .lock()
            .unwrap()
            .pop_front()
            .map(Secret::new)
            .ok_or_else(|| Error::NonInteractive(label.to_string()))
    }
}
