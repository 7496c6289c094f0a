//! Pagination controller.
//!
//! Drives each logical resource of the external catalog (taxonomy lists,
//! manga list, chapters per manga, pages per chapter) to completion with a
//! resource-specific termination policy, feeding every fetched page to the
//! upsert engine inside one store transaction.
//!
//! Page- and item-level failures are contained: they are logged, counted and
//! the sweep moves on. See [`CrawlError::is_contained`].

mod chapters;
mod endpoints;
mod error;
mod manga;
mod pages;
mod progress;
mod taxonomy;

pub use endpoints::{Endpoints, CHAPTER_PAGE_SIZE};
pub use error::CrawlError;
pub use progress::{NoProgress, PhaseStats, ProgressReporter, TaxonomyStats};
pub use taxonomy::SEARCH_PREFIXES;

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::info;

use crate::checkpoint::CheckpointStore;
use crate::clock::Clock;
use crate::config::CrawlerConfig;
use crate::fetch::{decode_json, Fetcher};
use crate::models::{
    ChapterDetail, Checkpoint, CrawlMode, CrawlRequest, DetailData, Envelope, ListData, ListPage,
    Phase, TaxonomyKind,
};
use crate::repository::CatalogStore;

pub type Result<T> = std::result::Result<T, CrawlError>;

/// Crawls the external catalog into a [`CatalogStore`].
pub struct Crawler<S: CatalogStore> {
    store: Arc<S>,
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
    config: CrawlerConfig,
    endpoints: Endpoints,
    checkpoints: Option<Arc<CheckpointStore>>,
}

impl<S: CatalogStore> Clone for Crawler<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            fetcher: Arc::clone(&self.fetcher),
            clock: Arc::clone(&self.clock),
            config: self.config.clone(),
            endpoints: self.endpoints.clone(),
            checkpoints: self.checkpoints.clone(),
        }
    }
}

impl<S: CatalogStore> Crawler<S> {
    pub fn new(
        store: Arc<S>,
        fetcher: Arc<dyn Fetcher>,
        clock: Arc<dyn Clock>,
        mut config: CrawlerConfig,
    ) -> Self {
        config.batch_size = config.batch_size.max(1);
        let endpoints = Endpoints::new(&config.base_url);
        Self {
            store,
            fetcher,
            clock,
            config,
            endpoints,
            checkpoints: None,
        }
    }

    /// Persist progress of the manga, chapters and pages phases.
    pub fn with_checkpoints(mut self, checkpoints: Arc<CheckpointStore>) -> Self {
        self.checkpoints = Some(checkpoints);
        self
    }

    /// Report entities instead of persisting them.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.config.dry_run = dry_run;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size.max(1);
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn checkpoints(&self) -> Option<&Arc<CheckpointStore>> {
        self.checkpoints.as_ref()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub(crate) async fn pause(&self, millis: u64) {
        self.clock.sleep(Duration::from_millis(millis)).await;
    }

    /// Fetch and decode one page of a list endpoint.
    pub(crate) async fn fetch_list<T: DeserializeOwned>(&self, url: &str) -> Result<ListPage<T>> {
        let body = self.fetcher.fetch(url, &self.config.headers).await?;
        let envelope: Envelope<ListData<T>> =
            decode_json(&body).map_err(|source| CrawlError::Decode {
                url: url.to_string(),
                source,
            })?;
        Ok(envelope.into_page())
    }

    /// Fetch and decode a chapter detail.
    pub(crate) async fn fetch_chapter_detail(&self, chapter_id: &str) -> Result<ChapterDetail> {
        let url = self.endpoints.chapter_detail(chapter_id)?;
        let body = self.fetcher.fetch(&url, &self.config.headers).await?;
        let envelope: Envelope<DetailData<ChapterDetail>> =
            decode_json(&body).map_err(|source| CrawlError::Decode {
                url: url.clone(),
                source,
            })?;
        envelope
            .data
            .map(DetailData::into_inner)
            .ok_or_else(|| CrawlError::NotFound {
                kind: "chapter detail",
                id: chapter_id.to_string(),
            })
    }

    fn persists_checkpoints(&self) -> bool {
        self.checkpoints.is_some() && !self.config.dry_run
    }

    /// Save a checkpoint and write back the stamped copy.
    pub(crate) fn save_checkpoint(&self, checkpoint: &mut Checkpoint) -> Result<()> {
        if !self.persists_checkpoints() {
            return Ok(());
        }
        if let Some(store) = &self.checkpoints {
            *checkpoint = store.save(checkpoint)?;
        }
        Ok(())
    }

    pub(crate) fn clear_checkpoint(&self) -> Result<()> {
        if !self.persists_checkpoints() {
            return Ok(());
        }
        if let Some(store) = &self.checkpoints {
            store.clear()?;
        }
        Ok(())
    }

    /// A checkpoint to continue from, or a fresh one for `phase`.
    pub(crate) fn checkpoint_for(&self, phase: Phase, resume: Option<Checkpoint>) -> Checkpoint {
        match resume {
            Some(checkpoint) if checkpoint.phase == phase => checkpoint,
            _ => Checkpoint::new(phase, self.clock.now()),
        }
    }

    /// Crawl all five taxonomy kinds in order; the first escalated error stops.
    pub async fn crawl_master_data(&self) -> Result<Vec<(TaxonomyKind, TaxonomyStats)>> {
        info!("Starting master data crawl");
        let mut results = Vec::with_capacity(TaxonomyKind::ALL.len());
        for (i, kind) in TaxonomyKind::ALL.into_iter().enumerate() {
            info!("Master data phase {}/5: {}", i + 1, kind.table());
            let stats = self.crawl_taxonomy(kind).await?;
            results.push((kind, stats));
        }
        info!("Master data crawl completed");
        Ok(results)
    }

    /// Master data, manga pages 1 to 10, chapters for every comic, then
    /// pages for every chapter lacking them.
    pub async fn crawl_all(&self, progress: &dyn ProgressReporter) -> Result<()> {
        info!("Starting complete crawl");

        progress.step("Crawling master data", 0, 4);
        self.crawl_master_data().await?;

        progress.step("Crawling manga", 1, 4);
        self.crawl_manga(1, 10).await?;

        progress.step("Crawling chapters", 2, 4);
        self.crawl_all_chapters().await?;

        progress.step("Crawling pages", 3, 4);
        self.crawl_all_pages().await?;

        progress.step("Completed", 4, 4);
        info!("Complete crawl finished");
        Ok(())
    }

    /// Continue the phase recorded in the checkpoint.
    pub async fn resume(&self) -> Result<PhaseStats> {
        let store = self.checkpoints.as_ref().ok_or(CrawlError::NoCheckpoint)?;
        let checkpoint = store.load()?.ok_or(CrawlError::NoCheckpoint)?;
        info!(
            "Resuming {} crawl from page {}",
            checkpoint.phase.as_str(),
            checkpoint.current_page
        );

        match checkpoint.phase {
            Phase::Manga => {
                let start = checkpoint.current_page.max(1);
                self.crawl_manga_from(start, -1, Some(checkpoint)).await
            }
            Phase::Chapters => self.crawl_all_chapters_from(Some(checkpoint)).await,
            Phase::Pages => self.crawl_all_pages_from(Some(checkpoint)).await,
        }
    }

    /// Execute one crawl request.
    pub async fn run(&self, request: &CrawlRequest, progress: &dyn ProgressReporter) -> Result<()> {
        let request = request.clone().with_defaults();
        let crawler = self
            .clone()
            .with_dry_run(self.config.dry_run || request.dry_run)
            .with_batch_size(request.batch_size);

        progress.step("Running crawl", 0, 1);
        match request.mode {
            CrawlMode::Genres => crawler.crawl_taxonomy(TaxonomyKind::Genre).await.map(|_| ()),
            CrawlMode::Formats => crawler.crawl_taxonomy(TaxonomyKind::Format).await.map(|_| ()),
            CrawlMode::Types => crawler.crawl_taxonomy(TaxonomyKind::Type).await.map(|_| ()),
            CrawlMode::Authors => crawler.crawl_taxonomy(TaxonomyKind::Author).await.map(|_| ()),
            CrawlMode::Artists => crawler.crawl_taxonomy(TaxonomyKind::Artist).await.map(|_| ()),
            CrawlMode::Manga => crawler
                .crawl_manga(request.start_page, request.end_page)
                .await
                .map(|_| ()),
            CrawlMode::Chapters => match request.single_manga() {
                Some(manga_id) => crawler.crawl_chapters_for_manga(manga_id).await.map(|_| ()),
                None => crawler.crawl_all_chapters().await.map(|_| ()),
            },
            CrawlMode::Pages => crawler.crawl_all_pages().await.map(|_| ()),
            CrawlMode::Master => crawler.crawl_master_data().await.map(|_| ()),
            CrawlMode::All => crawler.crawl_all(progress).await,
        }
    }
}

/// Log up to `limit` names followed by a count of the rest.
pub(crate) fn log_preview<'a>(label: &str, names: impl Iterator<Item = &'a str>, limit: usize) {
    let names: Vec<&str> = names.collect();
    info!("DRY RUN: would save {} {}", names.len(), label);
    for name in names.iter().take(limit) {
        info!("  - {}", name);
    }
    if names.len() > limit {
        info!("  ... and {} more {}", names.len() - limit, label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{list_of_names, TestHarness};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingProgress {
        steps: Mutex<Vec<(String, u32, u32)>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn step(&self, name: &str, completed: u32, total: u32) {
            self.steps
                .lock()
                .unwrap()
                .push((name.to_string(), completed, total));
        }
    }

    #[tokio::test]
    async fn test_master_data_runs_every_kind_in_order() {
        let h = TestHarness::new();
        let e = h.crawler.endpoints().clone();
        h.fetcher.respond(&e.taxonomy_list(TaxonomyKind::Type, 1).unwrap(), list_of_names(&["Manhwa"]));

        let results = h.crawler.crawl_master_data().await.unwrap();
        let kinds: Vec<TaxonomyKind> = results.iter().map(|(kind, _)| *kind).collect();
        assert_eq!(kinds, TaxonomyKind::ALL.to_vec());
        assert_eq!(h.store.taxonomy_names(TaxonomyKind::Type).unwrap(), vec!["Manhwa"]);

        let requests = h.fetcher.requests();
        assert!(requests[0].contains("/genre/list"));
        assert!(requests.last().unwrap().contains("/artist/list"));
    }

    #[tokio::test]
    async fn test_crawl_all_reports_four_steps() {
        let h = TestHarness::new();
        let progress = RecordingProgress::default();
        h.crawler
            .run(&CrawlRequest::new(CrawlMode::All), &progress)
            .await
            .unwrap();

        let steps = progress.steps.lock().unwrap().clone();
        let names: Vec<&str> = steps.iter().map(|(name, _, _)| name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Running crawl",
                "Crawling master data",
                "Crawling manga",
                "Crawling chapters",
                "Crawling pages",
                "Completed"
            ]
        );
        assert_eq!(steps.last().map(|(_, done, total)| (*done, *total)), Some((4, 4)));
    }

    #[tokio::test]
    async fn test_run_dry_run_request_writes_nothing() {
        let h = TestHarness::new();
        let e = h.crawler.endpoints().clone();
        h.fetcher.respond(&e.taxonomy_list(TaxonomyKind::Genre, 1).unwrap(), list_of_names(&["Action"]));

        let request = CrawlRequest {
            dry_run: true,
            ..CrawlRequest::new(CrawlMode::Genres)
        };
        h.crawler.run(&request, &NoProgress).await.unwrap();
        assert!(h.store.taxonomy_names(TaxonomyKind::Genre).unwrap().is_empty());
        assert!(!h.crawler.config().dry_run);
    }

    #[tokio::test]
    async fn test_resume_without_checkpoint_store() {
        let h = TestHarness::new();
        assert!(matches!(h.crawler.resume().await, Err(CrawlError::NoCheckpoint)));
    }

    #[test]
    fn test_batch_size_is_at_least_one() {
        let h = TestHarness::new();
        assert_eq!(h.crawler.clone().with_batch_size(0).config().batch_size, 1);

        let config = CrawlerConfig {
            batch_size: 0,
            ..h.crawler.config().clone()
        };
        let crawler = Crawler::new(h.store.clone(), h.fetcher.clone(), h.clock.clone(), config);
        assert_eq!(crawler.config().batch_size, 1);
    }
}
