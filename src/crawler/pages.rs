//! Page image sweeps.

use tracing::{debug, info, warn};

use super::chapters::resume_position;
use super::{Crawler, PhaseStats, Result};
use crate::models::{Checkpoint, Phase};
use crate::repository::CatalogStore;
use crate::upsert::replace_chapter_pages;

impl<S: CatalogStore> Crawler<S> {
    /// Fetch one chapter's detail and replace its stored pages; returns the
    /// page count.
    pub async fn crawl_pages_for_chapter(&self, chapter_id: &str) -> Result<usize> {
        let detail = self.fetch_chapter_detail(chapter_id).await?;
        let count = detail.chapter.data.len();

        if self.config.dry_run {
            info!("DRY RUN: would save {} pages for chapter {}", count, chapter_id);
            return Ok(count);
        }

        let saved = self
            .store
            .transaction(|tx| replace_chapter_pages(tx, chapter_id, &detail))?;
        debug!("Saved {} pages for chapter {}", saved, chapter_id);
        Ok(saved)
    }

    /// Crawl pages for every stored chapter that has none.
    pub async fn crawl_all_pages(&self) -> Result<PhaseStats> {
        self.crawl_all_pages_from(None).await
    }

    /// Crawl pages for chapters lacking them, skipping chapters up to and
    /// including the checkpoint's last chapter.
    pub async fn crawl_all_pages_from(&self, resume: Option<Checkpoint>) -> Result<PhaseStats> {
        let ids = self.store.chapters_missing_pages(None)?;
        let mut checkpoint = self.checkpoint_for(Phase::Pages, resume);
        checkpoint.estimated_total = ids.len() as u64;

        let skip = resume_position(&ids, &checkpoint.last_chapter_id);
        info!("Crawling pages for {} chapters", ids.len() - skip);

        let mut stats = PhaseStats::default();
        let pending = &ids[skip..];
        for (i, chapter_id) in pending.iter().enumerate() {
            stats.processed += 1;
            match self.crawl_pages_for_chapter(chapter_id).await {
                Ok(_) => {
                    stats.success += 1;
                    checkpoint.success_count += 1;
                }
                Err(e) if e.is_contained() => {
                    warn!("Failed to crawl pages for chapter {}: {}", chapter_id, e);
                    stats.failed += 1;
                    checkpoint.error_count += 1;
                }
                Err(e) => return Err(e),
            }

            checkpoint.last_chapter_id = chapter_id.clone();
            checkpoint.total_processed += 1;
            if stats.processed % self.config.batch_size as u64 == 0 {
                self.save_checkpoint(&mut checkpoint)?;
                info!(
                    "Page progress: {}/{} chapters",
                    skip as u64 + stats.processed,
                    ids.len()
                );
            }

            if i + 1 < pending.len() {
                self.pause(self.config.delays.between_chapters_ms).await;
            }
        }

        self.clear_checkpoint()?;
        info!(
            "Page crawl completed: {} chapters, {} succeeded, {} failed",
            stats.processed, stats.success, stats.failed
        );
        Ok(stats)
    }

    /// Crawl pages for one comic's chapters that have none. No checkpoint.
    pub async fn crawl_pages_for_manga(&self, manga_id: &str) -> Result<PhaseStats> {
        let ids = self.store.chapters_missing_pages(Some(manga_id))?;
        let mut stats = PhaseStats::default();

        for (i, chapter_id) in ids.iter().enumerate() {
            stats.processed += 1;
            match self.crawl_pages_for_chapter(chapter_id).await {
                Ok(_) => stats.success += 1,
                Err(e) if e.is_contained() => {
                    warn!("Failed to crawl pages for chapter {}: {}", chapter_id, e);
                    stats.failed += 1;
                }
                Err(e) => return Err(e),
            }
            if i + 1 < ids.len() {
                self.pause(self.config.delays.between_chapters_ms).await;
            }
        }

        debug!(
            "Crawled pages for {} chapters of manga {}",
            stats.success, manga_id
        );
        Ok(stats)
    }
}
