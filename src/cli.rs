use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "svcp")]
#[command(about = "Provision, wire and run the backend, frontend and sync services")]
#[command(version)]
pub struct Cli {
    /// Config file path (defaults to svcp.yaml in the working directory or a parent)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Working directory
    #[arg(short, long, global = true)]
    pub workdir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create missing service configuration files from templates or defaults
    Provision,

    /// Validate a database credential and write it to the credential store and every consumer
    Distribute {
        /// Database host (defaults to database.host)
        #[arg(long)]
        host: Option<String>,

        /// Database port (defaults to database.port)
        #[arg(long)]
        port: Option<u16>,

        /// Database name (defaults to database.name)
        #[arg(long)]
        database: Option<String>,

        /// Database user (defaults to database.user)
        #[arg(long)]
        user: Option<String>,

        /// Read the password from the first line of standard input
        #[arg(long)]
        password_stdin: bool,
    },

    /// Check the database connection a service is configured with
    Probe {
        /// Service whose configuration is probed
        #[arg(short, long, default_value = "backend")]
        service: String,
    },

    /// Start a service, or all of them
    Start {
        /// Service name (sync, backend, frontend) or "all"
        target: String,
    },

    /// Stop a service, or all of them
    Stop {
        /// Service name (sync, backend, frontend) or "all"
        target: String,
    },

    /// Show which services are running
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the end of a service's log
    Logs {
        /// Service name
        service: String,

        /// Number of lines
        #[arg(short = 'n', long, default_value_t = 50)]
        lines: usize,
    },

    /// Full setup: provision, validate, distribute, probe, then offer to start everything
    Setup {
        /// Read the password from the first line of standard input
        #[arg(long)]
        password_stdin: bool,
    },
}
