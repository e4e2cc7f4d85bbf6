mod cli;
mod commands;
mod output;

use clap::Parser;
use cli::{Cli, Commands};
use service_provisioner::{Deployment, Error as SvcpError};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        if let Some(svcp_error) = e.downcast_ref::<SvcpError>() {
            eprintln!("Error: {}", svcp_error);
            if let Some(suggestion) = svcp_error.suggestion() {
                eprintln!("\nHint: {}", suggestion);
            }
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let deployment = Deployment::load(cli.config.as_deref(), cli.workdir.clone())?;
    let out = output::CliOutput;

    match cli.command {
        Commands::Provision => commands::run_provision(&deployment, &out),
        Commands::Distribute {
            host,
            port,
            database,
            user,
            password_stdin,
        } => {
            let args = commands::DistributeArgs {
                host,
                port,
                database,
                user,
                password_stdin,
            };
            commands::run_distribute(&deployment, args, &out).await
        }
        Commands::Probe { service } => commands::run_probe(&deployment, &service, &out).await,
        Commands::Start { target } => commands::run_start(&deployment, &target, &out).await,
        Commands::Stop { target } => commands::run_stop(&deployment, &target, &out).await,
        Commands::Status { json } => commands::run_status(&deployment, json, &out).await,
        Commands::Logs { service, lines } => {
            commands::run_logs(&deployment, &service, lines, &out)
        }
        Commands::Setup { password_stdin } => {
            commands::run_setup(&deployment, password_stdin, &out).await
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
