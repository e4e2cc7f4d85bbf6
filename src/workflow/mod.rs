//! The full setup run: `Provision → Validate → Distribute → Probe`.
//!
//! Each phase is a method on [`SetupWorkflow`] and can be driven on its own;
//! [`SetupWorkflow::run`] chains them. Operator input comes through an
//! injected [`Prompter`].

use crate::credential::{
    ConsumerUpdate, CredentialRecord, CredentialStore, DistributionReport, Secret,
};
use crate::deployment::Deployment;
use crate::error::{Error, Result};
use crate::probe::{ConnectivityProbe, ConnectivityResult};
use crate::prompt::Prompter;
use crate::provision::ProvisionOutcome;
use crate::service::BatchReport;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Provision,
    Validate,
    Distribute,
    Probe,
}

impl Phase {
    pub const ORDER: [Phase; 4] = [
        Phase::Provision,
        Phase::Validate,
        Phase::Distribute,
        Phase::Probe,
    ];

    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Provision => Some(Phase::Validate),
            Phase::Validate => Some(Phase::Distribute),
            Phase::Distribute => Some(Phase::Probe),
            Phase::Probe => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Provision => write!(f, "provision"),
            Phase::Validate => write!(f, "validate"),
            Phase::Distribute => write!(f, "distribute"),
            Phase::Probe => write!(f, "probe"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaInit {
    /// The schema object exists, or no check was configured.
    NotNeeded,
    Declined,
    Initialized,
}

#[derive(Debug)]
pub struct SetupReport {
    pub provision: BatchReport<ProvisionOutcome>,
    pub distribution: DistributionReport,
    pub schema: SchemaInit,
}

pub struct SetupWorkflow<'a, P: ConnectivityProbe + ?Sized> {
    deployment: &'a Deployment,
    probe: &'a P,
    prompter: &'a dyn Prompter,
}

impl<'a, P: ConnectivityProbe + ?Sized> SetupWorkflow<'a, P> {
    pub fn new(deployment: &'a Deployment, probe: &'a P, prompter: &'a dyn Prompter) -> Self {
        Self {
            deployment,
            probe,
            prompter,
        }
    }

    pub fn provision(&self) -> Result<BatchReport<ProvisionOutcome>> {
        self.deployment
            .provisioner()
            .provision_all(&self.deployment.services())
    }

    pub async fn validate(&self, record: &CredentialRecord) -> Result<ConnectivityResult> {
        self.deployment.distributor(self.probe)?.validate(record).await
    }

    pub fn distribute(
        &self,
        record: &CredentialRecord,
    ) -> Result<(Option<PathBuf>, Vec<ConsumerUpdate>)> {
        self.deployment.distributor(self.probe)?.apply(record)
    }

    /// End-to-end checks, then the schema initialization offer.
    pub async fn probe(
        &self,
        record: &CredentialRecord,
        validation: ConnectivityResult,
        backup: Option<PathBuf>,
        consumers: Vec<ConsumerUpdate>,
    ) -> Result<(DistributionReport, SchemaInit)> {
        let distributor = self.deployment.distributor(self.probe)?;
        let end_to_end = distributor.verify(record, &consumers).await?;
        let report = DistributionReport {
            key: record.key(),
            validation,
            store_path: distributor.store_path().to_path_buf(),
            backup,
            consumers,
            end_to_end,
        };
        let schema = self.offer_schema_init(&report.validation).await?;
        Ok((report, schema))
    }

    /// Run every phase in order for the distributed identity. The secret is
    /// taken from `secret`, else asked for through the prompter when the
    /// validate phase is reached. Stops at the first fatal error; a
    /// `ConnectionFailed` in validation leaves every file untouched.
    pub async fn run(&self, mut secret: Option<Secret>) -> Result<SetupReport> {
        let key = self.deployment.database_key();
        let mut phase = Some(Phase::Provision);
        let mut provision = None;
        let mut record = None;
        let mut validation = None;
        let mut applied = None;
        let mut finished = None;

        while let Some(current) = phase {
            tracing::info!("Setup phase: {}", current);
            match current {
                Phase::Provision => provision = Some(self.provision()?),
                Phase::Validate => {
                    let secret = match secret.take() {
                        Some(secret) => secret,
                        None => self.prompter.secret(&format!("Password for {}", key))?,
                    };
                    let candidate = key.clone().with_secret(secret);
                    validation = Some(self.validate(&candidate).await?);
                    record = Some(candidate);
                }
                Phase::Distribute => {
                    let record = record.as_ref().ok_or_else(Self::out_of_order)?;
                    applied = Some(self.distribute(record)?);
                }
                Phase::Probe => {
                    let record = record.as_ref().ok_or_else(Self::out_of_order)?;
                    let validation = validation.take().ok_or_else(Self::out_of_order)?;
                    let (backup, consumers) = applied.take().unwrap_or_default();
                    finished = Some(self.probe(record, validation, backup, consumers).await?);
                }
            }
            phase = current.next();
        }

        match (provision, finished) {
            (Some(provision), Some((distribution, schema))) => Ok(SetupReport {
                provision,
                distribution,
                schema,
            }),
            _ => Err(Self::out_of_order()),
        }
    }

    fn out_of_order() -> Error {
        Error::Config("setup phase reached before the phases it depends on".to_string())
    }

    /// If the validated connection found the schema object missing, offer to
    /// run the initialization script as the initialization identity.
    pub async fn offer_schema_init(&self, validation: &ConnectivityResult) -> Result<SchemaInit> {
        if !validation.schema_object_missing() {
            return Ok(SchemaInit::NotNeeded);
        }

        let object = self
            .deployment
            .config
            .database
            .schema_object
            .clone()
            .unwrap_or_default();
        let validated = self.deployment.database_key();
        let init_key = self.deployment.initialization_key();
        if init_key.user != validated.user {
            tracing::warn!(
                "Schema initialization runs as '{}' but the credential was validated as '{}'; \
                 set initialization.user in svcp.yaml if this is not intended",
                init_key.user,
                validated.user
            );
        }

        let question = format!(
            "{} does not exist. Run {} as '{}' now?",
            object,
            self.deployment.config.initialization.script,
            init_key.user
        );
        if !self.prompter.confirm(&question, false)? {
            return Ok(SchemaInit::Declined);
        }

        let script_path = self.deployment.init_script_path();
        let script = std::fs::read_to_string(&script_path).map_err(|e| {
            Error::Filesystem(format!(
                "Cannot read initialization script '{}': {}",
                script_path.display(),
                e
            ))
        })?;

        let secret = match CredentialStore::load(&self.deployment.credential_store_path())?
            .lookup(&init_key)
        {
            Some(secret) => secret,
            None => self
                .prompter
                .secret(&format!("Password for '{}'", init_key.user))?,
        };

        self.probe
            .initialize_schema(&init_key.clone().with_secret(secret), &script)
            .await?;
        tracing::info!("Initialized {} as '{}'", object, init_key.user);
        Ok(SchemaInit::Initialized)
    }
}
