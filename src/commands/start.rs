use super::finish_batch;
use crate::output::UserOutput;
use service_provisioner::service::{LifecycleManager, SystemProcessControl};
use service_provisioner::Deployment;

pub async fn run_start(
    deployment: &Deployment,
    target: &str,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let services = deployment.select(target)?;
    let manager = LifecycleManager::new(SystemProcessControl);

    if services.len() > 1 {
        out.status("Starting services...");
    }
    let report = manager.start_all(&services).await;
    finish_batch(report, out)?;

    for service in &services {
        tracing::debug!(
            "'{}' listens on {} and logs to {}",
            service.name,
            service.listen_port,
            service.log_path.display()
        );
    }
    Ok(())
}
