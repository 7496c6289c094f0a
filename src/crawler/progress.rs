//! Crawl statistics and progress reporting hooks.

use serde::Serialize;

/// Counters for one manga, chapters or pages phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PhaseStats {
    /// Items (manga, comics or chapters) attempted.
    pub processed: u64,
    pub success: u64,
    pub failed: u64,
    /// Remote pages fetched, including failed fetches.
    pub pages_fetched: u64,
    pub failed_pages: u64,
}

/// Counters for one taxonomy sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaxonomyStats {
    /// Unique names seen.
    pub found: u64,
    pub saved: u64,
    pub pages_fetched: u64,
    pub failed_pages: u64,
}

/// Receives coarse step updates from multi-phase crawls.
pub trait ProgressReporter: Send + Sync {
    fn step(&self, name: &str, completed: u32, total: u32);
}

/// Reporter that discards updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn step(&self, _name: &str, _completed: u32, _total: u32) {}
}
