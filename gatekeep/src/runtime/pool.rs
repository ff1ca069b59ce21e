//! Bounded worker pool for hashing and other CPU-heavy jobs.

use super::errors::{RuntimeError, RuntimeResult};
use std::{future::Future, sync::Arc};
use tokio::{runtime::Handle, sync::Semaphore, task::JoinHandle};

/// Default number of blocking jobs allowed to run at once
pub const DEFAULT_MAX_BLOCKING: usize = 4;

/// Explicitly constructed pool handed to every component that needs
/// asynchronous execution.
///
/// Blocking work (bcrypt, argon2) is pushed onto tokio's blocking threads,
/// gated by a semaphore so a burst of logins cannot starve the host.
#[derive(Clone)]
pub struct WorkerPool {
    handle: Handle,
    permits: Arc<Semaphore>,
    max_blocking: usize,
}

impl WorkerPool {
    /// Create a pool on top of an existing runtime
    ///
    /// # Arguments
    ///
    /// * `handle` - Runtime the jobs are spawned on
    /// * `max_blocking` - Upper bound on concurrently running blocking jobs
    pub fn new(handle: Handle, max_blocking: usize) -> Self {
        let max_blocking = max_blocking.max(1);
        Self {
            handle,
            permits: Arc::new(Semaphore::new(max_blocking)),
            max_blocking,
        }
    }

    /// Pool bound to the runtime of the calling task
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn current(max_blocking: usize) -> Self {
        Self::new(Handle::current(), max_blocking)
    }

    /// Run a blocking closure off the async threads and await its result
    ///
    /// # Errors
    ///
    /// * `RuntimeError::PoolClosed` - The pool was shut down
    /// * `RuntimeError::TaskFailed` - The closure panicked
    pub async fn run_blocking<F, R>(&self, job: F) -> RuntimeResult<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let _permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| RuntimeError::PoolClosed)?;

        Ok(self.handle.spawn_blocking(job).await?)
    }

    /// Spawn an async job on the pool's runtime
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(fut)
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn max_blocking(&self) -> usize {
        self.max_blocking
    }

    /// Blocking slots currently free
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Refuse further blocking jobs; running ones finish normally
    pub fn close(&self) {
        self.permits.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_blocking_returns_value() {
        let pool = WorkerPool::current(2);
        let value = pool.run_blocking(|| 21 * 2).await.unwrap();
        assert_eq!(value, 42);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn test_zero_bound_is_clamped() {
        let pool = WorkerPool::current(0);
        assert_eq!(pool.max_blocking(), 1);
        assert!(pool.run_blocking(|| ()).await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_pool_rejects_jobs() {
        let pool = WorkerPool::current(1);
        pool.close();
        let result = pool.run_blocking(|| ()).await;
        assert!(matches!(result, Err(RuntimeError::PoolClosed)));
    }

    #[tokio::test]
    async fn test_panicking_job_surfaces_error() {
        let pool = WorkerPool::current(1);
        let result = pool.run_blocking(|| -> u32 { panic!("boom") }).await;
        assert!(matches!(result, Err(RuntimeError::TaskFailed(_))));
    }
}
