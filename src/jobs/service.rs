//! Crawl job dispatch.

use std::any::Any;
use std::future::Future;

use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info};

use super::{JobError, JobProgressReporter, JobTracker};
use crate::crawler::Crawler;
use crate::models::{CrawlJob, CrawlMode, CrawlRequest, Phase};
use crate::repository::CatalogStore;

/// A job that has been registered and spawned.
#[derive(Debug)]
pub struct StartedJob {
    pub id: String,
    /// Resolves once the job is recorded as completed or failed.
    pub task: JoinHandle<()>,
}

/// Starts crawls as background jobs.
pub struct CrawlService<S: CatalogStore> {
    crawler: Crawler<S>,
    tracker: JobTracker,
}

impl<S: CatalogStore> CrawlService<S> {
    pub fn new(crawler: Crawler<S>, tracker: JobTracker) -> Self {
        Self { crawler, tracker }
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    pub fn crawler(&self) -> &Crawler<S> {
        &self.crawler
    }

    /// Spawn a crawl for `request`.
    pub fn start(&self, request: CrawlRequest) -> StartedJob {
        let job = self.tracker.create(request.mode, self.crawler.clock().now());
        info!("Starting crawl job {} ({})", job.id, request.mode);

        let crawler = self.crawler.clone();
        let progress = JobProgressReporter::new(self.tracker.clone(), job.id.clone());
        let task = self.supervise(job.id.clone(), async move {
            crawler
                .run(&request, &progress)
                .await
                .map_err(|e| e.to_string())
        });

        StartedJob { id: job.id, task }
    }

    pub fn status(&self, job_id: &str) -> Result<CrawlJob, JobError> {
        self.tracker
            .get(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))
    }

    /// Clear the stored checkpoint. Running jobs are not interrupted.
    pub fn stop(&self) -> Result<(), JobError> {
        if let Some(checkpoints) = self.crawler.checkpoints() {
            checkpoints.clear().map_err(|e| JobError::Crawl(e.into()))?;
        }
        info!("Crawl checkpoint cleared");
        Ok(())
    }

    /// Spawn a job continuing the checkpoint's phase.
    pub fn resume(&self) -> Result<StartedJob, JobError> {
        let checkpoint = match self.crawler.checkpoints() {
            Some(store) => store
                .load()
                .map_err(|e| JobError::Crawl(e.into()))?
                .ok_or(JobError::NoCheckpoint)?,
            None => return Err(JobError::NoCheckpoint),
        };

        let mode = match checkpoint.phase {
            Phase::Manga => CrawlMode::Manga,
            Phase::Chapters => CrawlMode::Chapters,
            Phase::Pages => CrawlMode::Pages,
        };
        let job = self.tracker.create(mode, self.crawler.clock().now());
        info!(
            "Resuming {} crawl as job {} from page {}",
            checkpoint.phase.as_str(),
            job.id,
            checkpoint.current_page
        );

        self.tracker.update_progress(&job.id, "Resuming", 0, 1);
        let crawler = self.crawler.clone();
        let task = self.supervise(job.id.clone(), async move {
            crawler.resume().await.map(|_| ()).map_err(|e| e.to_string())
        });

        Ok(StartedJob { id: job.id, task })
    }

    /// Run `work` on its own task and record its outcome, including a panic
    /// or cancellation, against job `id`.
    fn supervise<F>(&self, id: String, work: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<(), String>> + Send + 'static,
    {
        let crawler = self.crawler.clone();
        let tracker = self.tracker.clone();
        tokio::spawn(async move {
            let result = tokio::spawn(work).await.unwrap_or_else(|e| Err(join_failure(e)));
            finish(&tracker, &crawler, &id, result);
        })
    }
}

fn join_failure(err: JoinError) -> String {
    if !err.is_panic() {
        return format!("crawl task cancelled: {}", err);
    }
    format!("crawl task panicked: {}", panic_message(&*err.into_panic()))
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        *msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic"
    }
}

fn finish<S: CatalogStore>(
    tracker: &JobTracker,
    crawler: &Crawler<S>,
    id: &str,
    result: Result<(), String>,
) {
    match &result {
        Ok(()) => info!("Crawl job {} completed", id),
        Err(e) => error!("Crawl job {} failed: {}", id, e),
    }
    tracker.complete(id, result, crawler.clock().now());
}
