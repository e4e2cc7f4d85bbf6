use crate::output::UserOutput;
use service_provisioner::service::tail_log;
use service_provisioner::Deployment;

pub fn run_logs(
    deployment: &Deployment,
    service: &str,
    lines: usize,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let descriptor = deployment.service(service)?;
    if !descriptor.log_path.exists() {
        out.status(&format!(
            "No logs for '{}' yet ({} does not exist)",
            descriptor.name,
            descriptor.log_path.display()
        ));
        return Ok(());
    }

    for line in tail_log(&descriptor, lines)? {
        out.data(&line);
    }
    Ok(())
}
