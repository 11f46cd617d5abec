//! Thread-safe priority task scheduler.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info, instrument, trace, warn};

use crate::dispatch::Dispatch;
use crate::pending::PendingWork;

/// Dispatches tasks highest priority first, FIFO among equal priorities.
///
/// # Thread Safety
///
/// All operations take `&self` and may be called concurrently. A single lock
/// guards the pending buckets; it is released before an executor runs, so an
/// executor may add tasks to the scheduler that is running it.
///
/// # Failures
///
/// A task is removed from the queue before its executor is invoked. If the
/// executor fails (by `Err` or by panicking) the failure reaches the caller
/// and the task is gone; nothing is re-queued.
#[derive(Debug)]
pub struct PriorityScheduler<T, P> {
    pending: Mutex<PendingWork<T, P>>,
    dispatched: AtomicU64,
    idle_polls: AtomicU64,
}

impl<T, P: Ord> PriorityScheduler<T, P> {
    /// Creates an empty scheduler.
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(PendingWork::new()),
            dispatched: AtomicU64::new(0),
            idle_polls: AtomicU64::new(0),
        }
    }

    /// Queues `task` behind any earlier tasks of the same `priority`.
    pub fn add_task(&self, task: T, priority: P) {
        let mut pending = self.pending.lock();
        pending.push(task, priority);
        trace!(pending = pending.len(), "Task admitted");
    }

    /// Dequeues the next task and runs `executor` on it.
    ///
    /// Returns [`Dispatch::Idle`] without calling `executor` when nothing is
    /// pending. Otherwise returns what `executor` returned, after it returns.
    #[instrument(level = "debug", skip_all)]
    pub fn execute_next<F, R>(&self, executor: F) -> Dispatch<R>
    where
        F: FnOnce(T) -> R,
    {
        match self.next_task() {
            Some(task) => Dispatch::Executed(executor(task)),
            None => {
                self.idle_polls.fetch_add(1, Ordering::Relaxed);
                info!("No tasks to execute");
                Dispatch::Idle
            }
        }
    }

    /// Fallible form of [`PriorityScheduler::execute_next`].
    ///
    /// An `Err` from `executor` is returned unchanged; the task stays dequeued.
    pub fn try_execute_next<F, R, E>(&self, executor: F) -> Result<Dispatch<R>, E>
    where
        F: FnOnce(T) -> Result<R, E>,
    {
        match self.execute_next(executor) {
            Dispatch::Executed(Ok(value)) => Ok(Dispatch::Executed(value)),
            Dispatch::Executed(Err(err)) => {
                warn!("Executor failed; task was already dequeued");
                Err(err)
            }
            Dispatch::Idle => Ok(Dispatch::Idle),
        }
    }

    /// Runs `executor` on every pending task until the queue is empty,
    /// including tasks the executor itself adds. Returns how many ran.
    pub fn execute_all<F>(&self, mut executor: F) -> usize
    where
        F: FnMut(T),
    {
        let mut executed = 0;
        while let Some(task) = self.next_task() {
            executor(task);
            executed += 1;
        }
        debug!(executed, "Drained scheduler");
        executed
    }

    /// Dequeues the next task without running anything.
    pub fn next_task(&self) -> Option<T> {
        let task = self.pending.lock().pop_highest()?;
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        debug!("Task dispatched");
        Some(task)
    }

    /// Returns the number of pending tasks.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns true if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of distinct priorities with pending work.
    pub fn priority_count(&self) -> usize {
        self.pending.lock().bucket_count()
    }

    /// Drops every pending task, returning how many were dropped.
    pub fn clear(&self) -> usize {
        let mut pending = self.pending.lock();
        let dropped = pending.len();
        pending.clear();
        dropped
    }

    /// Returns scheduler statistics.
    pub fn stats(&self) -> SchedulerStats {
        let pending = self.pending.lock();
        SchedulerStats {
            pending: pending.len(),
            priorities: pending.bucket_count(),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            idle_polls: self.idle_polls.load(Ordering::Relaxed),
        }
    }
}

impl<T, P: Ord + Clone> PriorityScheduler<T, P> {
    /// Returns the priority the next dispatch will serve.
    pub fn peek_priority(&self) -> Option<P> {
        self.pending.lock().highest_priority().cloned()
    }

    /// Returns every priority with pending work, highest first.
    pub fn priorities(&self) -> Vec<P> {
        self.pending.lock().priorities().cloned().collect()
    }
}

impl<T, P: Ord> Default for PriorityScheduler<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Scheduler statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Tasks waiting to run
    pub pending: usize,
    /// Distinct priorities among pending tasks
    pub priorities: usize,
    /// Tasks released so far
    pub dispatched: u64,
    /// Dispatch attempts that found nothing pending
    pub idle_polls: u64,
}
