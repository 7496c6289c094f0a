//! Shared CLI helpers.

use std::sync::Arc;

use crate::checkpoint::CheckpointStore;
use crate::clock::SystemClock;
use crate::config::Settings;
use crate::crawler::Crawler;
use crate::fetch::HttpFetcher;
use crate::repository::SqliteCatalog;

/// Open the catalog and wire a crawler with the HTTP fetcher and the
/// configured checkpoint file.
pub fn build_crawler(settings: &Settings) -> anyhow::Result<Crawler<SqliteCatalog>> {
    let store = Arc::new(SqliteCatalog::new(&settings.database, settings.store.clone())?);
    let fetcher = Arc::new(HttpFetcher::new(
        settings.crawler.request_timeout(),
        settings.crawler.verbose,
    )?);
    let checkpoints = Arc::new(CheckpointStore::new(&settings.checkpoint));

    Ok(
        Crawler::new(store, fetcher, Arc::new(SystemClock), settings.crawler.clone())
            .with_checkpoints(checkpoints),
    )
}

/// Format a duration in seconds as `1h 2m 3s`.
pub fn format_elapsed(seconds: i64) -> String {
    crate::checkpoint::format_duration(seconds.max(0) as u64)
}
