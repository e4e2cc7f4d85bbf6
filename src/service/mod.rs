//! Service descriptors and process lifecycle.
//!
//! - [`ServiceDescriptor`]: where a known service lives and how it is started
//! - [`ProcessHandle`]: the pid file written next to the service's log
//! - [`ProcessControl`]: the OS boundary for detached launch, liveness and termination
//! - [`LifecycleManager`]: start/stop/status per service and in batches
//!
//! # Example
//!
//! ```no_run
//! use service_provisioner::service::{LifecycleManager, SystemProcessControl};
//! use service_provisioner::Deployment;
//!
//! # async fn example() -> service_provisioner::Result<()> {
//! let deployment = Deployment::load(None, None)?;
//! let manager = LifecycleManager::new(SystemProcessControl);
//! let report = manager.start_all(&deployment.services()).await;
//! for failed in report.failed() {
//!     eprintln!("{} did not start", failed);
//! }
//! # Ok(())
//! # }
//! ```

mod descriptor;
mod handle;
mod lifecycle;
mod process;
mod types;

pub use descriptor::*;
pub use handle::{HandleFile, ProcessHandle};
pub use lifecycle::*;
pub use process::*;
pub use types::*;
