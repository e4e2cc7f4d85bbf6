#![allow(unused_assignments)]

//! # Service Provisioner
//!
//! Provisioning and process lifecycle for a small multi-service deployment:
//! an API backend, a UI frontend and a data-sync service sharing one
//! PostgreSQL database.
//!
//! ## Features
//!
//! - **Provisioning**: create missing per-service `.env` files from templates or defaults
//! - **Credential distribution**: validate a database credential, then upsert it into a
//!   libpq passfile and into every consuming service's settings file
//! - **Connectivity probing**: bounded `SELECT 1` plus a schema object check
//! - **Lifecycle**: detached start with pid files and appended logs, SIGTERM stop,
//!   stale pid detection
//!
//! ## Quick Start
//!
//! ```no_run
//! use service_provisioner::credential::Secret;
//! use service_provisioner::Deployment;
//!
//! # async fn example() -> service_provisioner::Result<()> {
//! let deployment = Deployment::load(None, None)?;
//! let probe = deployment.probe()?;
//! let record = deployment.database_key().with_secret(Secret::new("s3cret"));
//!
//! let report = deployment.distributor(&probe)?.distribute(&record).await?;
//! assert!(report.end_to_end_ok());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod credential;
pub mod deployment;
pub mod error;
mod files;
pub mod probe;
pub mod prompt;
pub mod provision;
pub mod service;
#[cfg(test)]
mod test_support;
pub mod workflow;

pub use config::{Config, Parser};
pub use deployment::Deployment;
pub use error::{Error, Result};
