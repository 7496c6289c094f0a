//! Taxonomy enumerations.
//!
//! Genres, formats and types are walked page by page until a page is empty
//! or several consecutive pages add no new name. Authors and artists sit
//! behind a search index, so they are swept once per single-character
//! prefix instead.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use super::{log_preview, CrawlError, Crawler, Result, TaxonomyStats};
use crate::models::{NamedEntry, TaxonomyKind};
use crate::repository::CatalogStore;
use crate::upsert::save_taxonomy;

/// Search prefixes covering a search-only index.
pub const SEARCH_PREFIXES: [&str; 37] = [
    "", "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r",
    "s", "t", "u", "v", "w", "x", "y", "z", "0", "1", "2", "3", "4", "5", "6", "7", "8", "9",
];

/// Names seen so far in one sweep, in first-seen order.
#[derive(Default)]
struct NameSet {
    seen: HashSet<String>,
    ordered: Vec<String>,
}

impl NameSet {
    /// Record a page of entries and return the names not seen before.
    fn absorb(&mut self, entries: &[NamedEntry]) -> Vec<String> {
        let mut fresh = Vec::new();
        for entry in entries {
            let name = entry.name.trim();
            if name.is_empty() {
                continue;
            }
            if self.seen.insert(name.to_string()) {
                self.ordered.push(name.to_string());
                fresh.push(name.to_string());
            }
        }
        fresh
    }
}

impl<S: CatalogStore> Crawler<S> {
    /// Crawl one taxonomy kind with the policy that fits its endpoint.
    pub async fn crawl_taxonomy(&self, kind: TaxonomyKind) -> Result<TaxonomyStats> {
        if kind.is_search_backed() {
            self.crawl_taxonomy_search(kind, &SEARCH_PREFIXES).await
        } else {
            self.crawl_taxonomy_list(kind).await
        }
    }

    /// Walk `{kind}/list` pages from 1.
    ///
    /// Stops on an empty page, or once `max_duplicate_pages` consecutive
    /// pages contributed no new name. A failed page counts as contributing
    /// nothing.
    pub async fn crawl_taxonomy_list(&self, kind: TaxonomyKind) -> Result<TaxonomyStats> {
        info!("Starting {} crawl", kind.table());

        let mut names = NameSet::default();
        let mut stats = TaxonomyStats::default();
        let mut stale_pages = 0u32;
        let mut page = 1i64;

        loop {
            let url = self.endpoints.taxonomy_list(kind, page)?;
            stats.pages_fetched += 1;

            let fresh = match self.fetch_list::<NamedEntry>(&url).await {
                Ok(list) => {
                    if list.items.is_empty() {
                        info!("No {} on page {}, stopping", kind.table(), page);
                        break;
                    }
                    let fresh = names.absorb(&list.items);
                    debug!(
                        "Found {} {} ({} new) on page {}",
                        list.items.len(),
                        kind.table(),
                        fresh.len(),
                        page
                    );
                    fresh
                }
                Err(e) if e.is_contained() => {
                    warn!("Failed to fetch {} page {}: {}", kind.table(), page, e);
                    stats.failed_pages += 1;
                    Vec::new()
                }
                Err(e) => return Err(e),
            };

            if fresh.is_empty() {
                stale_pages += 1;
                if stale_pages >= self.config.max_duplicate_pages {
                    info!(
                        "Stopping {} crawl after {} pages without new entries",
                        kind.table(),
                        stale_pages
                    );
                    break;
                }
            } else {
                stale_pages = 0;
                stats.saved += self.persist_names(kind, &fresh)?;
            }

            page += 1;
            self.pause(self.config.delays.taxonomy_page_ms).await;
        }

        stats.found = names.ordered.len() as u64;
        self.finish_taxonomy(kind, &names, stats);
        Ok(stats)
    }

    /// Sweep a search-backed taxonomy once per query prefix.
    ///
    /// Each query pages until an empty page, the reported last page, or a
    /// failed fetch.
    pub async fn crawl_taxonomy_search(
        &self,
        kind: TaxonomyKind,
        queries: &[&str],
    ) -> Result<TaxonomyStats> {
        info!(
            "Starting {} crawl over {} search queries",
            kind.table(),
            queries.len()
        );

        let mut names = NameSet::default();
        let mut stats = TaxonomyStats::default();

        for (i, query) in queries.iter().enumerate() {
            let mut page = 1i64;
            loop {
                let url = self.endpoints.taxonomy_search(kind, query, page)?;
                stats.pages_fetched += 1;

                let list = match self.fetch_list::<NamedEntry>(&url).await {
                    Ok(list) => list,
                    Err(e) if e.is_contained() => {
                        warn!(
                            "Failed to fetch {} page {} for query '{}': {}",
                            kind.table(),
                            page,
                            query,
                            e
                        );
                        stats.failed_pages += 1;
                        break;
                    }
                    Err(e) => return Err(e),
                };

                if list.items.is_empty() {
                    debug!("No more {} for query '{}'", kind.table(), query);
                    break;
                }

                let fresh = names.absorb(&list.items);
                debug!(
                    "Found {} {} ({} new) on page {}/{} for query '{}'",
                    list.items.len(),
                    kind.table(),
                    fresh.len(),
                    page,
                    list.total_page.unwrap_or(0),
                    query
                );
                if !fresh.is_empty() {
                    stats.saved += self.persist_names(kind, &fresh)?;
                }

                if list.total_page.is_some_and(|total| page >= total) {
                    break;
                }

                page += 1;
                self.pause(self.config.delays.search_page_ms).await;
            }

            if i + 1 < queries.len() {
                self.pause(self.config.delays.search_query_ms).await;
            }
        }

        stats.found = names.ordered.len() as u64;
        self.finish_taxonomy(kind, &names, stats);
        Ok(stats)
    }

    /// Upsert newly seen names in one transaction; contained failures are
    /// logged and count as zero saved.
    fn persist_names(&self, kind: TaxonomyKind, fresh: &[String]) -> Result<u64> {
        if self.config.dry_run {
            return Ok(0);
        }
        match self
            .store
            .transaction(|tx| save_taxonomy(tx, kind, fresh))
            .map_err(CrawlError::from)
        {
            Ok(saved) => Ok(saved as u64),
            Err(e) if e.is_contained() => {
                warn!("Failed to save {} {}: {}", fresh.len(), kind.table(), e);
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    fn finish_taxonomy(&self, kind: TaxonomyKind, names: &NameSet, stats: TaxonomyStats) {
        if self.config.dry_run {
            log_preview(kind.table(), names.ordered.iter().map(String::as_str), 10);
        }
        info!(
            "{} crawl completed: {} unique, {} saved, {} pages ({} failed)",
            kind.table(),
            stats.found,
            stats.saved,
            stats.pages_fetched,
            stats.failed_pages
        );
    }
}
