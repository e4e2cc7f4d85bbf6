use super::read_secret;
use crate::output::UserOutput;
use service_provisioner::credential::{ConsumerOutcome, ConsumerUpdate, EndToEndCheck};
use service_provisioner::prompt;
use service_provisioner::workflow::{SchemaInit, SetupWorkflow};
use service_provisioner::Deployment;
use std::path::Path;

pub struct DistributeArgs {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password_stdin: bool,
}

pub async fn run_distribute(
    deployment: &Deployment,
    args: DistributeArgs,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    // Flags override the configured identity for this run only.
    let mut deployment = deployment.clone();
    let db = &mut deployment.config.database;
    if let Some(host) = args.host {
        db.host = host;
    }
    if let Some(port) = args.port {
        db.port = port;
    }
    if let Some(database) = args.database {
        db.name = database;
    }
    if let Some(user) = args.user {
        db.user = user;
    }

    let prompter = prompt::prompter();
    let key = deployment.database_key();
    let secret = read_secret(args.password_stdin, prompter.as_ref(), &key)?;
    let record = key.with_secret(secret);

    let probe = deployment.probe()?;
    let distributor = deployment.distributor(&probe)?;

    out.progress(&format!("Validating {}...", record.key()));
    let validation = match distributor.validate(&record).await {
        Ok(v) => {
            out.finish_progress(&format!(" ok ({} ms)", v.latency.as_millis()));
            v
        }
        Err(e) => {
            out.finish_progress(" failed");
            out.status("Nothing was written.");
            return Err(e.into());
        }
    };

    let (backup, consumers) = distributor.apply(&record)?;
    print_applied(out, distributor.store_path(), backup.as_deref(), &consumers);

    let checks = distributor.verify(&record, &consumers).await?;
    let all_ok = print_checks(out, &checks);

    let workflow = SetupWorkflow::new(&deployment, &probe, prompter.as_ref());
    print_schema(out, workflow.offer_schema_init(&validation).await?);

    if !all_ok {
        anyhow::bail!("the credential was written but an end-to-end check failed");
    }
    Ok(())
}

pub(super) fn print_applied(
    out: &dyn UserOutput,
    store: &Path,
    backup: Option<&Path>,
    consumers: &[ConsumerUpdate],
) {
    if let Some(backup) = backup {
        out.status(&format!("Backed up credential store to {}", backup.display()));
    }
    out.success(&format!("Credential stored in {}", store.display()));
    for update in consumers {
        let target = &update.target;
        match update.outcome {
            ConsumerOutcome::Updated => out.success(&format!(
                "{}: {} updated in {}",
                target.service,
                target.key,
                target.path.display()
            )),
            ConsumerOutcome::Unchanged => out.success(&format!(
                "{}: {} already up to date",
                target.service, target.key
            )),
            ConsumerOutcome::Missing => out.warning(&format!(
                "{}: {} does not exist, run `svcp provision` first",
                target.service,
                target.path.display()
            )),
        }
    }
}

/// Returns true when every check passed.
pub(super) fn print_checks(out: &dyn UserOutput, checks: &[EndToEndCheck]) -> bool {
    let mut all_ok = true;
    for check in checks {
        let identity = check
            .key
            .as_ref()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "-".to_string());
        if check.result.success {
            out.success(&format!(
                "End-to-end via {}: connected as {} ({} ms)",
                check.source,
                identity,
                check.result.latency.as_millis()
            ));
        } else {
            all_ok = false;
            out.error(&format!(
                "End-to-end via {}: {}",
                check.source,
                check.result.failure.as_deref().unwrap_or("failed")
            ));
        }
    }
    all_ok
}

pub(super) fn print_schema(out: &dyn UserOutput, schema: SchemaInit) {
    match schema {
        SchemaInit::NotNeeded => {}
        SchemaInit::Declined => out.warning("Schema object is missing; initialization skipped."),
        SchemaInit::Initialized => out.success("Schema initialized."),
    }
}
