use crate::output::UserOutput;
use service_provisioner::probe::ConnectivityProbe;
use service_provisioner::{Deployment, Error};

pub async fn run_probe(
    deployment: &Deployment,
    service: &str,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let record = deployment.service_credential(service)?;
    let schema_object = deployment.config.database.schema_object()?;
    let probe = deployment.probe()?;

    out.progress(&format!("Connecting to {}...", record.key()));
    let result = probe.check(&record, schema_object.as_ref()).await;
    if !result.success {
        out.finish_progress(" failed");
        return Err(Error::ConnectionFailed {
            target: record.key().to_string(),
            reason: result.failure.unwrap_or_else(|| "unknown error".to_string()),
        }
        .into());
    }
    out.finish_progress(&format!(" ok ({} ms)", result.latency.as_millis()));

    if let Some(object) = schema_object {
        match result.schema_object_present {
            Some(true) => out.success(&format!("{} exists", object)),
            Some(false) => out.warning(&format!(
                "{} does not exist; `svcp distribute` or `svcp setup` can initialize it",
                object
            )),
            None => {}
        }
    }
    Ok(())
}
