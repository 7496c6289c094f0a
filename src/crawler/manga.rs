//! Manga list sweep.

use tracing::{debug, info, warn};

use super::{CrawlError, Crawler, PhaseStats, Result};
use crate::models::{Checkpoint, ExternalManga, Phase};
use crate::repository::CatalogStore;
use crate::upsert::{save_manga, MangaOutcome};

impl<S: CatalogStore> Crawler<S> {
    /// Crawl manga list pages `start..=end`; `end == -1` means until the
    /// upstream runs out.
    pub async fn crawl_manga(&self, start: i64, end: i64) -> Result<PhaseStats> {
        self.crawl_manga_from(start, end, None).await
    }

    /// Crawl manga list pages, continuing the counters of `resume` when it
    /// belongs to the manga phase.
    pub async fn crawl_manga_from(
        &self,
        start: i64,
        end: i64,
        resume: Option<Checkpoint>,
    ) -> Result<PhaseStats> {
        if start < 1 {
            return Err(CrawlError::InvalidRequest(format!(
                "start page must be at least 1, got {}",
                start
            )));
        }
        if end < -1 || (end != -1 && end < start) {
            return Err(CrawlError::InvalidRequest(format!(
                "invalid page range {}..{}",
                start, end
            )));
        }

        let bound = if end == -1 {
            "unbounded".to_string()
        } else {
            end.to_string()
        };
        info!("Starting manga crawl from page {} to {}", start, bound);

        let mut checkpoint = self.checkpoint_for(Phase::Manga, resume);
        let mut stats = PhaseStats::default();
        let mut consecutive_failures = 0u32;
        let mut page = start;

        loop {
            if end != -1 && page > end {
                break;
            }

            let url = self.endpoints.manga_list(page, self.config.manga_page_size)?;
            stats.pages_fetched += 1;

            let list = match self.fetch_list::<ExternalManga>(&url).await {
                Ok(list) => {
                    consecutive_failures = 0;
                    list
                }
                Err(e) if e.is_contained() => {
                    warn!("Failed to fetch manga page {}: {}", page, e);
                    stats.failed_pages += 1;
                    consecutive_failures += 1;
                    checkpoint.error_count += 1;
                    page += 1;
                    checkpoint.current_page = page;
                    self.save_checkpoint(&mut checkpoint)?;

                    if end == -1 && consecutive_failures >= self.config.max_failed_pages {
                        warn!(
                            "Stopping manga crawl after {} consecutive failed pages",
                            consecutive_failures
                        );
                        break;
                    }
                    self.pause(self.config.delays.manga_page_ms).await;
                    continue;
                }
                Err(e) => return Err(e),
            };

            if list.items.is_empty() {
                info!("No manga on page {}, stopping", page);
                break;
            }

            let count = list.items.len() as u64;
            stats.processed += count;
            debug!(
                "Found {} manga on page {}/{}",
                count,
                page,
                list.total_page.unwrap_or(0)
            );

            let page_success = if self.config.dry_run {
                super::log_preview(
                    &format!("manga from page {}", page),
                    list.items.iter().map(|m| m.title.as_str()),
                    3,
                );
                count
            } else {
                let (saved, skipped) = self.save_manga_page(page, &list.items)?;
                let failed = count - saved - skipped;
                stats.failed += failed;
                checkpoint.error_count += failed;
                if skipped > 0 {
                    debug!("Skipped {} duplicate manga on page {}", skipped, page);
                }
                saved
            };
            stats.success += page_success;

            checkpoint.current_page = page + 1;
            checkpoint.total_processed += count;
            checkpoint.success_count += page_success;
            if let Some(total) = list.total_page {
                checkpoint.estimated_total = total as u64 * count;
            }
            self.save_checkpoint(&mut checkpoint)?;

            if list.total_page.is_some_and(|total| page >= total) {
                info!("Reached last manga page {}", page);
                break;
            }

            page += 1;
            self.pause(self.config.delays.manga_page_ms).await;
        }

        self.clear_checkpoint()?;
        info!(
            "Manga crawl completed: {} processed, {} saved, {} failed, {} pages ({} failed)",
            stats.processed, stats.success, stats.failed, stats.pages_fetched, stats.failed_pages
        );
        Ok(stats)
    }

    /// Save one page of manga atomically; returns (saved, skipped).
    ///
    /// A contained store failure rolls the page back and reports nothing
    /// saved.
    fn save_manga_page(&self, page: i64, items: &[ExternalManga]) -> Result<(u64, u64)> {
        let result = self.store.transaction(|tx| {
            let mut outcomes = Vec::with_capacity(items.len());
            for manga in items {
                outcomes.push(save_manga(tx, manga)?);
            }
            Ok::<_, CrawlError>(outcomes)
        });

        match result {
            Ok(outcomes) => {
                let saved = outcomes.iter().filter(|o| o.is_saved()).count() as u64;
                let skipped = outcomes
                    .iter()
                    .filter(|o| matches!(o, MangaOutcome::SkippedDuplicate { .. }))
                    .count() as u64;
                Ok((saved, skipped))
            }
            Err(e) if e.is_contained() => {
                warn!("Failed to save manga page {}: {}", page, e);
                Ok((0, 0))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::test_support::{empty_list, manga_json, TestHarness};
    use serde_json::json;

    fn page_of(ids: &[(&str, &str)], total_page: i64) -> serde_json::Value {
        let data: Vec<_> = ids.iter().map(|(id, title)| manga_json(id, title, None)).collect();
        json!({"retcode": 0, "meta": {"total_page": total_page}, "data": data})
    }

    #[tokio::test]
    async fn test_rejects_bad_range() {
        let h = TestHarness::new();
        assert!(matches!(
            h.crawler.crawl_manga(0, 5).await,
            Err(CrawlError::InvalidRequest(_))
        ));
        assert!(matches!(
            h.crawler.crawl_manga(1, -2).await,
            Err(CrawlError::InvalidRequest(_))
        ));
        assert!(h.fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn test_stops_at_total_page() {
        let h = TestHarness::new();
        let e = h.crawler.endpoints().clone();
        let size = h.crawler.config().manga_page_size;
        h.fetcher.respond(&e.manga_list(1, size).unwrap(), page_of(&[("m1", "Solo Hunter"), ("m2", "Blue Lotus")], 2));
        h.fetcher.respond(&e.manga_list(2, size).unwrap(), page_of(&[("m3", "Night Garden")], 2));

        let stats = h.crawler.crawl_manga(1, -1).await.unwrap();
        assert_eq!(stats.pages_fetched, 2);
        assert_eq!(stats.processed, 3);
        assert_eq!(stats.success, 3);
        assert_eq!(h.store.comic_external_ids().unwrap(), vec!["m1", "m2", "m3"]);
    }

    #[tokio::test]
    async fn test_stops_on_empty_page_and_end_bound() {
        let h = TestHarness::new();
        let e = h.crawler.endpoints().clone();
        let size = h.crawler.config().manga_page_size;
        h.fetcher.respond(&e.manga_list(1, size).unwrap(), page_of(&[("m1", "Solo Hunter")], 0));
        h.fetcher.respond(&e.manga_list(2, size).unwrap(), empty_list());

        let stats = h.crawler.crawl_manga(1, 10).await.unwrap();
        assert_eq!(stats.pages_fetched, 2);

        let h = TestHarness::new();
        for page in 1..=5 {
            h.fetcher.respond(
                &e.manga_list(page, size).unwrap(),
                page_of(&[(&format!("m{}", page), &format!("Title {}", page))], 0),
            );
        }
        let stats = h.crawler.crawl_manga(2, 3).await.unwrap();
        assert_eq!(stats.pages_fetched, 2);
        assert_eq!(h.store.comic_external_ids().unwrap(), vec!["m2", "m3"]);
    }

    #[tokio::test]
    async fn test_failed_pages_are_skipped() {
        let h = TestHarness::new();
        let e = h.crawler.endpoints().clone();
        let size = h.crawler.config().manga_page_size;
        h.fetcher.fail(&e.manga_list(1, size).unwrap(), 502);
        h.fetcher.respond(&e.manga_list(2, size).unwrap(), page_of(&[("m2", "Blue Lotus")], 2));

        let stats = h.crawler.crawl_manga(1, -1).await.unwrap();
        assert_eq!(stats.failed_pages, 1);
        assert_eq!(stats.success, 1);
    }

    #[tokio::test]
    async fn test_unbounded_crawl_gives_up_after_consecutive_failures() {
        let h = TestHarness::new();
        let e = h.crawler.endpoints().clone();
        let size = h.crawler.config().manga_page_size;
        for page in 1..=20 {
            h.fetcher.fail(&e.manga_list(page, size).unwrap(), 500);
        }

        let stats = h.crawler.crawl_manga(1, -1).await.unwrap();
        assert_eq!(stats.failed_pages, u64::from(h.crawler.config().max_failed_pages));
    }

    #[tokio::test]
    async fn test_recrawl_updates_in_place() {
        let h = TestHarness::new();
        let e = h.crawler.endpoints().clone();
        let size = h.crawler.config().manga_page_size;
        let url = e.manga_list(1, size).unwrap();
        h.fetcher.respond(&url, page_of(&[("m1", "Solo Hunter")], 1));
        h.fetcher.respond(&url, page_of(&[("m1", "Solo Hunter Returns")], 1));

        h.crawler.crawl_manga(1, 1).await.unwrap();
        let first = h.store.comic_by_external_id("m1").unwrap().unwrap();
        h.crawler.crawl_manga(1, 1).await.unwrap();
        let second = h.store.comic_by_external_id("m1").unwrap().unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.fields.title, "Solo Hunter Returns");
        assert_eq!(h.store.stats().unwrap().comics, 1);
    }

    #[tokio::test]
    async fn test_checkpoint_cleared_after_completion() {
        let h = TestHarness::new();
        let (_dir, checkpoints) = h.checkpoint_store();
        let crawler = h.crawler.clone().with_checkpoints(checkpoints.clone());
        let e = crawler.endpoints().clone();
        let size = crawler.config().manga_page_size;
        h.fetcher.respond(&e.manga_list(1, size).unwrap(), page_of(&[("m1", "Solo Hunter")], 1));

        crawler.crawl_manga(1, -1).await.unwrap();
        assert!(checkpoints.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resume_continues_from_checkpoint_page() {
        let h = TestHarness::new();
        let (_dir, checkpoints) = h.checkpoint_store();
        let crawler = h.crawler.clone().with_checkpoints(checkpoints.clone());
        let e = crawler.endpoints().clone();
        let size = crawler.config().manga_page_size;

        let mut checkpoint = Checkpoint::new(Phase::Manga, h.clock.now());
        checkpoint.current_page = 3;
        checkpoint.total_processed = 48;
        checkpoints.save(&checkpoint).unwrap();

        h.fetcher.respond(&e.manga_list(3, size).unwrap(), page_of(&[("m9", "Late Bloom")], 3));

        let stats = crawler.resume().await.unwrap();
        assert_eq!(stats.processed, 1);
        assert_eq!(h.fetcher.requests(), vec![e.manga_list(3, size).unwrap()]);
        assert!(checkpoints.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dry_run_saves_nothing() {
        let h = TestHarness::new();
        let crawler = h.crawler.clone().with_dry_run(true);
        let e = crawler.endpoints().clone();
        let size = crawler.config().manga_page_size;
        h.fetcher.respond(&e.manga_list(1, size).unwrap(), page_of(&[("m1", "Solo Hunter")], 1));

        let stats = crawler.crawl_manga(1, -1).await.unwrap();
        assert_eq!(stats.processed, 1);
        assert_eq!(h.store.stats().unwrap().comics, 0);
    }
}
