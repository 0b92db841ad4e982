pub mod discovery;
pub mod enrichment;
pub mod failure;
pub mod filter;
pub mod messaging;
pub mod run_lock;

pub use failure::UpstreamError;
pub use run_lock::{RunLock, RunToken};

use tokio::sync::watch;

/// Process-level shutdown flag. Stages check it between units of work.
pub type Shutdown = watch::Receiver<bool>;

pub fn shutdown_requested(shutdown: &Shutdown) -> bool {
    *shutdown.borrow()
}
