//! One update check over the recently updated manga feed.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::AutoUpdateConfig;
use crate::crawler::{CrawlError, Crawler};
use crate::models::ExternalManga;
use crate::repository::CatalogStore;
use crate::upsert::{save_manga, MangaOutcome};

/// Counters from one update check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    /// Feed pages fetched successfully.
    pub pages_checked: u64,
    pub new_manga: u64,
    /// Known manga whose chapters were crawled again.
    pub chapter_recrawls: u64,
    /// Manga whose missing pages were crawled.
    pub page_crawls: u64,
    pub errors: u64,
}

/// Walk up to `max_pages` pages of the feed, saving new manga and
/// re-crawling chapters of known manga that report a newer chapter.
///
/// Page and item failures are logged and counted; only errors that would
/// fail any request (such as an unusable base URL) end the check.
pub(crate) async fn check_for_updates<S: CatalogStore>(
    crawler: &Crawler<S>,
    config: &AutoUpdateConfig,
) -> Result<UpdateReport, CrawlError> {
    let mut report = UpdateReport::default();

    for page in 1..=i64::from(config.max_pages) {
        let url = crawler.endpoints().manga_list(page, config.page_size)?;
        let list = match crawler.fetch_list::<ExternalManga>(&url).await {
            Ok(list) => list,
            Err(e) if e.is_contained() => {
                warn!("Failed to fetch updates page {}: {}", page, e);
                report.errors += 1;
                continue;
            }
            Err(e) => return Err(e),
        };
        report.pages_checked += 1;

        if list.items.is_empty() {
            debug!("No more updates on page {}, stopping", page);
            break;
        }

        for manga in &list.items {
            if let Err(e) = process_manga(crawler, config, manga, &mut report).await {
                if !e.is_contained() {
                    return Err(e);
                }
                warn!("Failed to process update for manga {}: {}", manga.id, e);
                report.errors += 1;
            }
        }

        crawler.pause(crawler.config().delays.update_page_ms).await;
    }

    Ok(report)
}

async fn process_manga<S: CatalogStore>(
    crawler: &Crawler<S>,
    config: &AutoUpdateConfig,
    manga: &ExternalManga,
    report: &mut UpdateReport,
) -> Result<(), CrawlError> {
    let store = crawler.store();

    if store.comic_by_external_id(&manga.id)?.is_none() {
        info!("New manga found: {}", manga.title);
        let outcome = store.transaction(|tx| save_manga(tx, manga))?;
        if matches!(outcome, MangaOutcome::SkippedDuplicate { mapped: false, .. }) {
            return Ok(());
        }
        report.new_manga += 1;

        if config.crawl_chapters {
            if let Err(e) = crawler.crawl_chapters_for_manga(&manga.id).await {
                warn!("Failed to crawl chapters for new manga {}: {}", manga.id, e);
                report.errors += 1;
                return Ok(());
            }
            if config.crawl_pages {
                crawl_missing_pages(crawler, &manga.id, report).await?;
            }
        }
        return Ok(());
    }

    let local = store.max_chapter_number(&manga.id)?.unwrap_or(0.0);
    let latest = manga.latest_chapter_number.unwrap_or(0.0);
    if latest <= local {
        return Ok(());
    }

    info!(
        "New chapters found for {} (latest {}, stored {})",
        manga.title, latest, local
    );
    crawler.crawl_chapters_for_manga(&manga.id).await?;
    report.chapter_recrawls += 1;

    if config.crawl_pages {
        crawl_missing_pages(crawler, &manga.id, report).await?;
    }
    Ok(())
}

async fn crawl_missing_pages<S: CatalogStore>(
    crawler: &Crawler<S>,
    manga_id: &str,
    report: &mut UpdateReport,
) -> Result<(), CrawlError> {
    let stats = crawler.crawl_pages_for_manga(manga_id).await?;
    report.page_crawls += 1;
    report.errors += stats.failed;
    Ok(())
}
