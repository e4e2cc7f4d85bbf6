mod distribute;
mod logs;
mod probe;
mod provision;
mod setup;
mod start;
mod status;
mod stop;

pub use distribute::{run_distribute, DistributeArgs};
pub use logs::run_logs;
pub use probe::run_probe;
pub use provision::run_provision;
pub use setup::run_setup;
pub use start::run_start;
pub use status::run_status;
pub use stop::run_stop;

use crate::output::UserOutput;
use service_provisioner::credential::{read_secret_line, CredentialKey, Secret};
use service_provisioner::prompt::Prompter;
use service_provisioner::service::BatchReport;
use std::fmt::Display;

/// The secret from stdin (`--password-stdin`) or the masked prompt.
fn read_secret(
    password_stdin: bool,
    prompter: &dyn Prompter,
    key: &CredentialKey,
) -> service_provisioner::Result<Secret> {
    if password_stdin {
        read_secret_line(std::io::stdin().lock())
    } else {
        prompter.secret(&format!("Password for {}", key))
    }
}

/// Print one line per service, then turn failures into the command's error.
///
/// With a single service the error itself is returned so `main` prints it
/// once, with its own hint.
fn finish_batch<T: Display>(report: BatchReport<T>, out: &dyn UserOutput) -> anyhow::Result<()> {
    let single = report.results.len() == 1;
    let failure = report.failure();

    for entry in report.results {
        match entry.result {
            Ok(outcome) => out.success(&format!("{}: {}", entry.service, outcome)),
            Err(e) if single => return Err(e.into()),
            Err(e) => out.error(&format!("{}: {}", entry.service, e.with_suggestion())),
        }
    }

    match failure {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
