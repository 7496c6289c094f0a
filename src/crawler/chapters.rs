//! Chapter list sweeps.

use tracing::{debug, info, warn};

use super::{Crawler, PhaseStats, Result};
use crate::models::{Checkpoint, ExternalChapter, Phase};
use crate::repository::CatalogStore;
use crate::upsert::save_chapters;

impl<S: CatalogStore> Crawler<S> {
    /// Crawl every chapter list page of one manga; returns the number of
    /// chapters seen.
    ///
    /// Any failure ends the call, leaving earlier pages committed.
    pub async fn crawl_chapters_for_manga(&self, manga_id: &str) -> Result<usize> {
        debug!("Crawling chapters for manga {}", manga_id);

        let mut total = 0usize;
        let mut page = 1i64;

        loop {
            let url = self.endpoints.chapter_list(manga_id, page)?;
            let list = self.fetch_list::<ExternalChapter>(&url).await?;
            if list.items.is_empty() {
                break;
            }

            total += list.items.len();
            if self.config.dry_run {
                info!(
                    "DRY RUN: would save {} chapters for manga {} from page {}",
                    list.items.len(),
                    manga_id,
                    page
                );
            } else {
                let saved = self
                    .store
                    .transaction(|tx| save_chapters(tx, manga_id, &list.items))?;
                debug!(
                    "Saved chapters page {} for manga {}: {} new, {} updated",
                    page, manga_id, saved.inserted, saved.updated
                );
            }

            page += 1;
            if list.total_page.is_some_and(|last| page > last) {
                break;
            }
            self.pause(self.config.delays.chapter_page_ms).await;
        }

        debug!("Found {} chapters for manga {}", total, manga_id);
        Ok(total)
    }

    /// Crawl chapters for every stored comic with an external id.
    pub async fn crawl_all_chapters(&self) -> Result<PhaseStats> {
        self.crawl_all_chapters_from(None).await
    }

    /// Crawl chapters for every stored comic, skipping those up to and
    /// including the checkpoint's last manga.
    pub async fn crawl_all_chapters_from(&self, resume: Option<Checkpoint>) -> Result<PhaseStats> {
        let ids = self.store.comic_external_ids()?;
        let mut checkpoint = self.checkpoint_for(Phase::Chapters, resume);
        checkpoint.estimated_total = ids.len() as u64;

        let skip = resume_position(&ids, &checkpoint.last_manga_id);
        if skip > 0 {
            info!("Skipping {} manga already crawled", skip);
        }
        info!("Crawling chapters for {} manga", ids.len() - skip);

        let mut stats = PhaseStats::default();
        let pending = &ids[skip..];
        for (i, manga_id) in pending.iter().enumerate() {
            stats.processed += 1;
            match self.crawl_chapters_for_manga(manga_id).await {
                Ok(_) => {
                    stats.success += 1;
                    checkpoint.success_count += 1;
                }
                Err(e) if e.is_contained() => {
                    warn!("Failed to crawl chapters for manga {}: {}", manga_id, e);
                    stats.failed += 1;
                    checkpoint.error_count += 1;
                }
                Err(e) => return Err(e),
            }

            checkpoint.last_manga_id = manga_id.clone();
            checkpoint.total_processed += 1;
            if stats.processed % self.config.batch_size as u64 == 0 {
                self.save_checkpoint(&mut checkpoint)?;
                info!(
                    "Chapter progress: {}/{} manga",
                    skip as u64 + stats.processed,
                    ids.len()
                );
            }

            if i + 1 < pending.len() {
                self.pause(self.config.delays.between_manga_ms).await;
            }
        }

        self.clear_checkpoint()?;
        info!(
            "Chapter crawl completed: {} manga, {} succeeded, {} failed",
            stats.processed, stats.success, stats.failed
        );
        Ok(stats)
    }
}

/// Index of the first id after `last`, or 0 when `last` is unset or unknown.
pub(crate) fn resume_position(ids: &[String], last: &str) -> usize {
    if last.is_empty() {
        return 0;
    }
    ids.iter().position(|id| id == last).map_or(0, |i| i + 1)
}
