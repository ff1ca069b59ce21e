//! Execution primitives injected into the core.
//!
//! - [`WorkerPool`]: bounded blocking-job pool for hashing
//! - [`Scheduler`]: delayed and repeating tasks returning [`CancellableTask`]
//! - [`Halt`]: latched fatal-storage signal awaited by the host

pub mod errors;
pub mod halt;
pub mod pool;
pub mod scheduler;

pub use errors::{RuntimeError, RuntimeResult};
pub use halt::Halt;
pub use pool::{DEFAULT_MAX_BLOCKING, WorkerPool};
pub use scheduler::{CancellableTask, Scheduler};
