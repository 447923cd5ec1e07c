//! Fixed-size thread pool draining a shared task queue.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use crate::observability::metrics;

/// Error returned by a failed task.
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

/// A unit of work, executed exactly once by one worker.
pub type Task = Box<dyn FnOnce() -> Result<(), TaskError> + Send + 'static>;

/// Errors raised while building a pool.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker pool needs at least one worker")]
    NoWorkers,

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

struct QueueState {
    tasks: VecDeque<Task>,
    closed: bool,
}

struct Shared {
    name: String,
    queue: Mutex<QueueState>,
    available: Condvar,
}

/// A bounded set of workers executing submitted tasks.
///
/// Dropping the pool closes the queue: workers finish what is already queued
/// and then exit. Running tasks are never interrupted.
pub struct WorkerPool {
    shared: Arc<Shared>,
    size: usize,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.shared.name)
            .field("size", &self.size)
            .field("queued", &self.queued())
            .finish()
    }
}

impl WorkerPool {
    /// Start `size` named worker threads.
    pub fn new(name: impl Into<String>, size: usize) -> Result<Self, PoolError> {
        if size == 0 {
            return Err(PoolError::NoWorkers);
        }

        let shared = Arc::new(Shared {
            name: name.into(),
            queue: Mutex::new(QueueState {
                tasks: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
        });

        for i in 0..size {
            let worker = shared.clone();
            let spawned = thread::Builder::new()
                .name(format!("{} - worker {}", shared.name, i + 1))
                .spawn(move || worker_loop(&worker));
            if let Err(e) = spawned {
                // Workers already running would otherwise wait forever.
                shared.close();
                return Err(e.into());
            }
        }

        tracing::info!(pool = %shared.name, workers = size, "Worker pool initialized");
        Ok(Self { shared, size })
    }

    /// Queue a task and wake one idle worker.
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() -> Result<(), TaskError> + Send + 'static,
    {
        let queued = {
            let mut queue = self.shared.queue.lock();
            queue.tasks.push_back(Box::new(task));
            queue.tasks.len()
        };
        self.shared.available.notify_one();
        tracing::trace!(pool = %self.shared.name, queued, "Task added to queue");
    }

    /// Number of workers.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Tasks waiting for a worker.
    pub fn queued(&self) -> usize {
        self.shared.queue.lock().tasks.len()
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }
}

impl Shared {
    fn close(&self) {
        self.queue.lock().closed = true;
        self.available.notify_all();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shared.close();
    }
}

fn worker_loop(shared: &Shared) {
    let worker = thread::current().name().unwrap_or("worker").to_string();

    loop {
        let task = {
            let mut queue = shared.queue.lock();
            loop {
                if let Some(task) = queue.tasks.pop_front() {
                    break task;
                }
                if queue.closed {
                    tracing::debug!(worker = %worker, "Queue closed, worker exiting");
                    return;
                }
                shared.available.wait(&mut queue);
            }
        };

        match panic::catch_unwind(AssertUnwindSafe(task)) {
            Ok(Ok(())) => metrics::record_task(&shared.name, "ok"),
            Ok(Err(e)) => {
                tracing::warn!(worker = %worker, error = %e, "Task failed");
                metrics::record_task(&shared.name, "error");
            }
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(worker = %worker, reason = %reason, "Task panicked");
                metrics::record_task(&shared.name, "panic");
            }
        }
    }
}
