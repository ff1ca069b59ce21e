//! Runtime error types.

use thiserror::Error;

/// Worker pool errors
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The pool's permit semaphore was closed
    #[error("Worker pool is shut down")]
    PoolClosed,

    /// A blocking job panicked or was cancelled
    #[error("Worker task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;
