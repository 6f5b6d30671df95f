//! Long-running feed service
//!
//! [`Service`] owns the feed registry, the record store and the crawler. Each
//! enabled feed runs shortly after start and then once per period; every run
//! saves its records and reschedules the feed whether or not it succeeded.

mod schedule;

pub use schedule::{FeedSchedule, ScheduledFeed};

use crate::config::{Feed, FeedRegistry, Reload};
use crate::crawler::Crawler;
use crate::storage::Repository;
use crate::{Result, Web2FeedError};
use chrono::Local;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Delay between service start and the first run of every feed
pub const START_DELAY: Duration = Duration::from_secs(1);

pub struct Service {
    registry: Arc<FeedRegistry>,
    repository: Arc<dyn Repository>,
    crawler: Crawler,
    schedule: FeedSchedule,
    period: Duration,
    running: Mutex<HashSet<String>>,
}

impl Service {
    /// `period` applies to feeds that do not set their own
    ///
    /// The crawler is given `repository` for its existence checks.
    pub fn new(
        registry: Arc<FeedRegistry>,
        repository: Arc<dyn Repository>,
        crawler: Crawler,
        period: Duration,
    ) -> Self {
        Self {
            registry,
            crawler: crawler.with_repository(Arc::clone(&repository)),
            repository,
            schedule: FeedSchedule::new(),
            period,
            running: Mutex::new(HashSet::new()),
        }
    }

    pub fn schedule(&self) -> &FeedSchedule {
        &self.schedule
    }

    pub fn registry(&self) -> &FeedRegistry {
        &self.registry
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repository
    }

    fn period_of(&self, feed: &Feed) -> Duration {
        feed.period.unwrap_or(self.period)
    }

    fn due_in(delay: Duration) -> chrono::DateTime<Local> {
        Local::now() + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero())
    }

    /// Schedules every enabled feed shortly after now
    pub fn schedule_all(&self) {
        for feed in self.registry.feeds() {
            if feed.disabled {
                tracing::info!("Feed '{}' is disabled", feed.name);
                continue;
            }
            self.schedule.add(Self::due_in(START_DELAY), &feed.name);
        }
    }

    /// Runs a feed as soon as possible
    pub fn update(&self, name: &str) -> Result<()> {
        if self.registry.get(name).is_none() {
            return Err(Web2FeedError::UnknownFeed(name.to_string()));
        }
        self.schedule.add(Local::now(), name);
        Ok(())
    }

    /// Re-reads a feed's file and drops its cached existence answers
    ///
    /// A changed feed is scheduled to run immediately.
    pub fn reload(&self, name: &str) -> Result<Reload> {
        let outcome = self.registry.reload(name)?;
        if outcome == Reload::Reloaded {
            self.repository.clear_cache(name);
            self.update(name)?;
        }
        Ok(outcome)
    }

    /// Runs one feed once and saves the new records
    ///
    /// Returns the number of records saved.
    pub async fn run_feed(&self, name: &str) -> Result<usize> {
        let feed = self
            .registry
            .get(name)
            .ok_or_else(|| Web2FeedError::UnknownFeed(name.to_string()))?;

        let records = self.crawler.run(&feed).await?;
        let saved = self.repository.save(&records)?;
        tracing::info!("[{}] saved {} records", name, saved);
        Ok(saved)
    }

    /// Runs due feeds until the task is dropped
    pub async fn run(self: Arc<Self>) {
        self.schedule_all();
        tracing::info!("Service started with {} feeds", self.registry.len());

        loop {
            let name = self.schedule.next_due().await;

            let feed = match self.registry.get(&name) {
                Some(feed) if !feed.disabled => feed,
                _ => {
                    tracing::debug!("Skipping '{}': unknown or disabled", name);
                    continue;
                }
            };

            if !self.mark_running(&name) {
                tracing::debug!("'{}' is already running", name);
                continue;
            }

            let service = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = service.run_feed(&feed.name).await {
                    tracing::error!("[{}] update failed: {}", feed.name, e);
                }
                service.finish_running(&feed.name);
                // Pick up a period changed by a reload during the run
                let current = service.registry.get(&feed.name).unwrap_or(feed);
                let period = service.period_of(&current);
                service.schedule.add(Self::due_in(period), &current.name);
            });
        }
    }

    fn mark_running(&self, name: &str) -> bool {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string())
    }

    fn finish_running(&self, name: &str) {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name);
    }
}
