use crate::output::UserOutput;
use service_provisioner::service::{LifecycleManager, ServiceState, SystemProcessControl};
use service_provisioner::Deployment;

pub async fn run_status(
    deployment: &Deployment,
    json: bool,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let manager = LifecycleManager::new(SystemProcessControl);
    let mut statuses = Vec::new();
    for service in deployment.services() {
        statuses.push(manager.status(&service).await?);
    }

    if json {
        out.data(&serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    out.status(&format!(
        "{:<10} {:<12} {:>8} {:>6}  {}",
        "SERVICE", "STATE", "PID", "PORT", "SINCE"
    ));
    for status in &statuses {
        let pid = status.pid.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
        let since = status
            .since
            .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        out.status(&format!(
            "{:<10} {:<12} {:>8} {:>6}  {}",
            status.service,
            status.state.to_string(),
            pid,
            status.port,
            since
        ));
    }

    if statuses.iter().any(|s| s.state == ServiceState::Stale) {
        out.blank();
        out.warning("Stale pid files found; `svcp stop <service>` clears them.");
    }
    Ok(())
}
