//! Due-time schedule of feed runs
//!
//! Feeds are kept in a min-heap on their due time. [`FeedSchedule::next_due`]
//! sleeps until the earliest entry is due and is woken early whenever an
//! entry is added.

use chrono::{DateTime, Local};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;

/// A feed waiting for its next run
#[derive(Debug, Clone)]
pub struct ScheduledFeed {
    pub due: DateTime<Local>,
    pub name: String,
}

// Earlier due times pop first from the max-heap
impl Ord for ScheduledFeed {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.name.cmp(&self.name))
    }
}

impl PartialOrd for ScheduledFeed {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ScheduledFeed {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.name == other.name
    }
}

impl Eq for ScheduledFeed {}

/// Feeds ordered by due time, at most one entry per feed
#[derive(Debug, Default)]
pub struct FeedSchedule {
    queue: Mutex<BinaryHeap<ScheduledFeed>>,
    changed: Notify,
}

impl FeedSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self) -> MutexGuard<'_, BinaryHeap<ScheduledFeed>> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Schedules `name` at `due`, replacing any pending entry for it
    pub fn add(&self, due: DateTime<Local>, name: &str) {
        {
            let mut queue = self.queue();
            queue.retain(|entry| entry.name != name);
            queue.push(ScheduledFeed {
                due,
                name: name.to_string(),
            });
        }
        tracing::debug!("Scheduled '{}' at {}", name, due.to_rfc3339());
        self.changed.notify_one();
    }

    /// Drops the pending entry of `name`; returns whether there was one
    pub fn remove(&self, name: &str) -> bool {
        let mut queue = self.queue();
        let before = queue.len();
        queue.retain(|entry| entry.name != name);
        queue.len() != before
    }

    pub fn clear(&self) {
        self.queue().clear();
    }

    pub fn len(&self) -> usize {
        self.queue().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue().is_empty()
    }

    /// Pending entries, earliest first
    pub fn snapshot(&self) -> Vec<ScheduledFeed> {
        self.queue().clone().into_sorted_vec().into_iter().rev().collect()
    }

    /// Removes and returns the earliest entry if it is due
    pub fn pop_due(&self, now: DateTime<Local>) -> Option<String> {
        let mut queue = self.queue();
        match queue.peek() {
            Some(entry) if entry.due <= now => queue.pop().map(|entry| entry.name),
            _ => None,
        }
    }

    /// Waits for the next due feed and returns its name
    pub async fn next_due(&self) -> String {
        loop {
            let now = Local::now();
            if let Some(name) = self.pop_due(now) {
                return name;
            }

            let wait = self
                .queue()
                .peek()
                .and_then(|entry| (entry.due - now).to_std().ok());

            match wait {
                Some(wait) => {
                    tokio::select! {
                        _ = tokio::time::sleep(wait) => {}
                        _ = self.changed.notified() => {}
                    }
                }
                None => self.changed.notified().await,
            }
        }
    }
}
