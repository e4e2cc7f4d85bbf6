//! Database credentials: the record itself, the passfile store that holds
//! them, and the distributor that fans a validated credential out to every
//! consumer.

mod distributor;
mod record;
mod secret;
mod store;

pub use distributor::*;
pub(crate) use distributor::consumer_record;
pub use record::{CredentialKey, CredentialRecord};
pub use secret::{read_secret_line, Secret};
pub use store::{backup_store, CredentialStore, StoreLine};
