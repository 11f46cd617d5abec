//! Priority buckets backing the scheduler.

use std::collections::{BTreeMap, VecDeque};

/// Tasks grouped into FIFO buckets, one per priority.
///
/// Every priority present in `buckets` maps to a non-empty bucket; a bucket
/// is removed the moment its last task leaves.
#[derive(Debug)]
pub(crate) struct PendingWork<T, P> {
    buckets: BTreeMap<P, VecDeque<T>>,
    len: usize,
}

impl<T, P: Ord> PendingWork<T, P> {
    pub(crate) fn new() -> Self {
        Self {
            buckets: BTreeMap::new(),
            len: 0,
        }
    }

    /// Appends `task` to the tail of the bucket for `priority`.
    pub(crate) fn push(&mut self, task: T, priority: P) {
        self.buckets.entry(priority).or_default().push_back(task);
        self.len += 1;
    }

    /// Removes the head of the highest-priority bucket.
    pub(crate) fn pop_highest(&mut self) -> Option<T> {
        let mut highest = self.buckets.last_entry()?;
        let task = highest.get_mut().pop_front();
        if highest.get().is_empty() {
            highest.remove();
        }
        if task.is_some() {
            self.len -= 1;
        }
        task
    }

    pub(crate) fn highest_priority(&self) -> Option<&P> {
        self.buckets.last_key_value().map(|(priority, _)| priority)
    }

    /// Priorities with pending work, highest first.
    pub(crate) fn priorities(&self) -> impl Iterator<Item = &P> {
        self.buckets.keys().rev()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub(crate) fn clear(&mut self) {
        self.buckets.clear();
        self.len = 0;
    }
}
