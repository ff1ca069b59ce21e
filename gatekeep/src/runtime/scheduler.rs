//! Delayed and repeating tasks with cancel handles.

use std::{future::Future, time::Duration};
use tokio::{runtime::Handle, task::JoinHandle};

/// Handle to a scheduled task. Cancelling is idempotent.
#[derive(Debug)]
pub struct CancellableTask {
    handle: JoinHandle<()>,
}

impl CancellableTask {
    pub fn new(handle: JoinHandle<()>) -> Self {
        Self { handle }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// True once the task ran to completion or was cancelled
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Spawns delayed and periodic work on a runtime
#[derive(Clone)]
pub struct Scheduler {
    handle: Handle,
}

impl Scheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Run `task` once after `after` has elapsed
    pub fn delay<F>(&self, after: Duration, task: F) -> CancellableTask
    where
        F: Future<Output = ()> + Send + 'static,
    {
        CancellableTask::new(self.handle.spawn(async move {
            tokio::time::sleep(after).await;
            task.await;
        }))
    }

    /// Run `task` after `delay`, then every `period` until cancelled
    pub fn repeat<F, Fut>(&self, delay: Duration, period: Duration, mut task: F) -> CancellableTask
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = period.max(Duration::from_millis(1));
        CancellableTask::new(self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                task().await;
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    #[tokio::test(start_paused = true)]
    async fn test_delay_runs_once() {
        let scheduler = Scheduler::current();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        let task = scheduler.delay(Duration::from_secs(5), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_delay_never_runs() {
        let scheduler = Scheduler::current();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        let task = scheduler.delay(Duration::from_secs(1), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        task.cancel();
        task.cancel();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_until_cancelled() {
        let scheduler = Scheduler::current();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        let task = scheduler.repeat(Duration::ZERO, Duration::from_secs(1), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(3500)).await;
        task.cancel();
        let seen = hits.load(Ordering::SeqCst);
        assert_eq!(seen, 4);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(hits.load(Ordering::SeqCst), seen);
    }
}
