//! Deferred task queue between producer threads and the publish thread.
//!
//! Producers `enqueue` closures without blocking beyond a short lock; the
//! single consumer periodically calls `drain_and_run`, which swaps the list
//! out and runs the captured tasks with the lock released.
//!
//! The queue is unbounded. Task volume is driven by submap updates, which
//! arrive orders of magnitude slower than sensor frames.
//!
//! A panicking task is not caught: it unwinds through `drain_and_run`, and
//! tasks that were swapped out with it but not yet run are dropped.

use parking_lot::Mutex;

/// A unit of work to run on the consumer thread.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Ordered, thread-safe, single-consumer queue of deferred tasks.
#[derive(Default)]
pub struct DeferredTaskQueue {
    tasks: Mutex<Vec<Task>>,
}

impl DeferredTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task to the tail of the queue.
    pub fn enqueue<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.tasks.lock().push(Box::new(task));
    }

    /// Run every queued task in enqueue order.
    ///
    /// Tasks enqueued while this runs (including by the tasks themselves) are
    /// left for the next call. Returns the number of tasks executed.
    pub fn drain_and_run(&self) -> usize {
        let tasks = std::mem::take(&mut *self.tasks.lock());
        let count = tasks.len();
        for task in tasks {
            task();
        }
        count
    }

    /// Number of tasks waiting to run.
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}

impl std::fmt::Debug for DeferredTaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredTaskQueue")
            .field("pending", &self.len())
            .finish()
    }
}
