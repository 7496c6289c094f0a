//! Background crawl jobs.
//!
//! [`JobTracker`] is the shared, lock-guarded job map; reads copy records
//! out so the lock is never held across work. [`CrawlService`] starts
//! crawls as tokio tasks and records their lifecycle in the tracker.

mod service;

pub use service::{CrawlService, StartedJob};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::crawler::{CrawlError, ProgressReporter};
use crate::models::{CrawlJob, CrawlMode, JobStatus};

/// Errors from the job surface.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("job not found: {0}")]
    NotFound(String),

    #[error("no checkpoint found to resume from")]
    NoCheckpoint,

    #[error(transparent)]
    Crawl(#[from] CrawlError),
}

/// Shared registry of crawl jobs.
#[derive(Debug, Clone, Default)]
pub struct JobTracker {
    jobs: Arc<Mutex<HashMap<String, CrawlJob>>>,
}

/// `crawl_<mode>_<unix-seconds>_<8 hex chars>`
pub fn job_id(mode: CrawlMode, now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("crawl_{}_{}_{}", mode.as_str(), now.timestamp(), &suffix[..8])
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CrawlJob>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a running job and return a copy of it.
    pub fn create(&self, mode: CrawlMode, now: DateTime<Utc>) -> CrawlJob {
        let job = CrawlJob::new(job_id(mode, now), mode, now);
        self.lock().insert(job.id.clone(), job.clone());
        job
    }

    /// Record a progress step; ignored once the job has finished.
    pub fn update_progress(&self, id: &str, step: &str, completed: u32, total: u32) -> bool {
        let mut jobs = self.lock();
        match jobs.get_mut(id) {
            Some(job) if job.is_running() => {
                job.progress.set(step, completed, total);
                true
            }
            _ => false,
        }
    }

    /// Mark a job completed or failed with the error text.
    pub fn complete(&self, id: &str, result: Result<(), String>, now: DateTime<Utc>) {
        let mut jobs = self.lock();
        let Some(job) = jobs.get_mut(id) else {
            return;
        };
        job.end_time = Some(now);
        match result {
            Ok(()) => {
                job.status = JobStatus::Completed;
                job.progress.percentage = 100.0;
                job.progress.current_step = "Completed".to_string();
            }
            Err(message) => {
                job.status = JobStatus::Failed;
                job.error = Some(message);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<CrawlJob> {
        self.lock().get(id).cloned()
    }

    /// The earliest-started running job, if any.
    pub fn active(&self) -> Option<CrawlJob> {
        self.lock()
            .values()
            .filter(|job| job.is_running())
            .min_by_key(|job| job.start_time)
            .cloned()
    }

    /// Every job, oldest first.
    pub fn history(&self) -> Vec<CrawlJob> {
        let mut jobs: Vec<CrawlJob> = self.lock().values().cloned().collect();
        jobs.sort_by_key(|job| job.start_time);
        jobs
    }
}

/// Forwards crawl steps to one tracked job.
pub(crate) struct JobProgressReporter {
    tracker: JobTracker,
    job_id: String,
}

impl JobProgressReporter {
    pub(crate) fn new(tracker: JobTracker, job_id: String) -> Self {
        Self { tracker, job_id }
    }
}

impl ProgressReporter for JobProgressReporter {
    fn step(&self, name: &str, completed: u32, total: u32) {
        self.tracker
            .update_progress(&self.job_id, name, completed, total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_job_id_format() {
        let id = job_id(CrawlMode::Manga, at(0));
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts[0], "crawl");
        assert_eq!(parts[1], "manga");
        assert_eq!(parts[2], "1700000000");
        assert_eq!(parts[3].len(), 8);
    }

    #[test]
    fn test_lifecycle() {
        let tracker = JobTracker::new();
        let job = tracker.create(CrawlMode::All, at(0));
        assert_eq!(job.progress.current_step, "Starting...");
        assert_eq!(tracker.active().map(|j| j.id), Some(job.id.clone()));

        assert!(tracker.update_progress(&job.id, "Crawling manga", 1, 4));
        assert_eq!(tracker.get(&job.id).unwrap().progress.percentage, 25.0);

        tracker.complete(&job.id, Ok(()), at(30));
        let done = tracker.get(&job.id).unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.progress.percentage, 100.0);
        assert_eq!(done.progress.current_step, "Completed");
        assert_eq!(done.elapsed(at(500)).num_seconds(), 30);
        assert!(tracker.active().is_none());

        assert!(!tracker.update_progress(&job.id, "late", 1, 1));
    }

    #[test]
    fn test_failed_job_keeps_error() {
        let tracker = JobTracker::new();
        let job = tracker.create(CrawlMode::Pages, at(0));
        tracker.complete(&job.id, Err("database error: disk full".to_string()), at(5));
        let failed = tracker.get(&job.id).unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("database error: disk full"));
    }

    #[test]
    fn test_history_is_ordered() {
        let tracker = JobTracker::new();
        let second = tracker.create(CrawlMode::Genres, at(10));
        let first = tracker.create(CrawlMode::Formats, at(1));
        let ids: Vec<String> = tracker.history().into_iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
        assert!(tracker.get("missing").is_none());
    }
}
