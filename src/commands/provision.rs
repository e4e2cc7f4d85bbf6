use crate::output::UserOutput;
use service_provisioner::provision::ProvisionOutcome;
use service_provisioner::service::{BatchReport, ServiceDescriptor};
use service_provisioner::Deployment;

pub fn run_provision(deployment: &Deployment, out: &dyn UserOutput) -> anyhow::Result<()> {
    out.status(&format!(
        "Provisioning service configuration in {}",
        deployment.work_dir.display()
    ));
    let services = deployment.services();
    let report = deployment.provisioner().provision_all(&services)?;
    print_provision(out, &services, &report);

    match report.failure() {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

pub(super) fn print_provision(
    out: &dyn UserOutput,
    services: &[ServiceDescriptor],
    report: &BatchReport<ProvisionOutcome>,
) {
    for (entry, service) in report.results.iter().zip(services) {
        let path = service.config_path.display();
        match &entry.result {
            Ok(ProvisionOutcome::MissingTemplate) => out.warning(&format!(
                "{}: no {} found, {} not created",
                entry.service,
                service.template_path.display(),
                path
            )),
            Ok(outcome) => out.success(&format!("{}: {} ({})", entry.service, path, outcome)),
            Err(e) => out.error(&format!("{}: {}", entry.service, e)),
        }
    }
}
