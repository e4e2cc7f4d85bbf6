use super::distribute::{print_applied, print_checks, print_schema};
use super::finish_batch;
use super::provision::print_provision;
use crate::output::UserOutput;
use service_provisioner::credential::read_secret_line;
use service_provisioner::prompt;
use service_provisioner::service::{LifecycleManager, SystemProcessControl};
use service_provisioner::workflow::{Phase, SetupWorkflow};
use service_provisioner::Deployment;

pub async fn run_setup(
    deployment: &Deployment,
    password_stdin: bool,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let prompter = prompt::prompter();
    let probe = deployment.probe()?;
    let workflow = SetupWorkflow::new(deployment, &probe, prompter.as_ref());
    let secret = if password_stdin {
        Some(read_secret_line(std::io::stdin().lock())?)
    } else {
        None
    };

    let phases = Phase::ORDER
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(" → ");
    out.status(&format!(
        "Setting up {} ({})",
        deployment.work_dir.display(),
        phases
    ));
    let report = workflow.run(secret).await?;

    out.blank();
    print_provision(out, &deployment.services(), &report.provision);

    let distribution = &report.distribution;
    out.blank();
    out.success(&format!(
        "Connected as {} ({} ms)",
        distribution.key,
        distribution.validation.latency.as_millis()
    ));
    print_applied(
        out,
        &distribution.store_path,
        distribution.backup.as_deref(),
        &distribution.consumers,
    );
    let all_ok = print_checks(out, &distribution.end_to_end);
    print_schema(out, report.schema);

    out.blank();
    if let Some(e) = report.provision.failure() {
        return Err(anyhow::Error::from(e).context("services were not started"));
    }
    if !all_ok {
        anyhow::bail!("setup finished but an end-to-end check failed; services were not started");
    }
    if prompter.confirm("Start all services now?", false)? {
        let manager = LifecycleManager::new(SystemProcessControl);
        finish_batch(manager.start_all(&deployment.services()).await, out)?;
    } else {
        out.status("Start the services later with `svcp start all`.");
    }
    Ok(())
}
