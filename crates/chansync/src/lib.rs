//! chansync: shared state guarded by a single coordinating task
//!
//! Instead of locking, all access to one value is funneled through a task
//! that owns it exclusively:
//! - `Guardian`: the cloneable caller handle exposing read and write
//! - `Cleanup`: the one-shot shutdown returned alongside it
//! - `Context`: cancellation token and deadline for a single call
//!
//! ```no_run
//! # async fn demo() -> chansync::GuardianResult<()> {
//! use chansync::Guardian;
//!
//! let (counter, cleanup) = Guardian::new(10u64);
//! counter.write(|value| *value += 10).await?;
//! assert_eq!(counter.read().await?, 20);
//! cleanup.shutdown().await;
//! # Ok(())
//! # }
//! ```

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod command;
pub mod config;
pub mod context;
pub mod errors;
mod guardian;
pub mod stats;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use command::{Mutator, Request};
pub use config::GuardianConfig;
pub use context::Context;
pub use errors::{GuardianError, GuardianResult, Operation};
pub use guardian::{Cleanup, Guardian};
pub use stats::GuardianStats;

// Re-exported so callers can build contexts without a direct dependency
pub use tokio_util::sync::CancellationToken;
