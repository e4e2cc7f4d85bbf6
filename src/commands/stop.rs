use super::finish_batch;
use crate::output::UserOutput;
use service_provisioner::service::{LifecycleManager, SystemProcessControl};
use service_provisioner::Deployment;

pub async fn run_stop(
    deployment: &Deployment,
    target: &str,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let services = deployment.select(target)?;
    let manager = LifecycleManager::new(SystemProcessControl);

    if services.len() > 1 {
        out.status("Stopping services...");
    }
    finish_batch(manager.stop_all(&services).await, out)
}
