//! Dedicated runtime for publish work, isolated from the request-handling runtime.

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::Semaphore;

use crate::{MessagingError, Result};

/// Sizing of the publish scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Worker threads dedicated to publishing.
    pub thread_pool_size: usize,
    /// Maximum number of tasks queued or running at once.
    pub task_queue_size: usize,
    /// Name given to the worker threads.
    pub thread_name: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            thread_pool_size: 10,
            task_queue_size: 100,
            thread_name: "publish-pool".to_string(),
        }
    }
}

/// Runs publish tasks on their own worker threads.
///
/// A saturated or slow channel only ties up these workers, never the
/// runtime serving reads. Admission is bounded by `task_queue_size`: when
/// every slot is taken, [`run`](Self::run) fails immediately instead of
/// queueing without limit.
pub struct PublishScheduler {
    runtime: Option<Runtime>,
    handle: Handle,
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl PublishScheduler {
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.thread_pool_size.max(1))
            .thread_name(config.thread_name.clone())
            .enable_all()
            .build()?;
        let capacity = config.task_queue_size.max(1);

        tracing::info!(
            threads = config.thread_pool_size,
            queue = capacity,
            name = %config.thread_name,
            "publish scheduler started"
        );

        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    /// Runs `task` on the publish workers and waits for its output.
    pub async fn run<F, T>(&self, task: F) -> Result<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .try_acquire_owned()
            .map_err(|_| MessagingError::SchedulerSaturated {
                capacity: self.capacity,
            })?;

        let join = self.handle.spawn(async move {
            let _permit = permit;
            task.await
        });

        join.await
            .map_err(|e| MessagingError::TaskFailed(e.to_string()))
    }

    /// Free task slots right now.
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Drop for PublishScheduler {
    fn drop(&mut self) {
        // Safe inside async contexts, unlike dropping the runtime directly.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
