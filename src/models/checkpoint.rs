//! Crawl checkpoint model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-level crawl stage tracked by a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Manga,
    Chapters,
    Pages,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manga => "manga",
            Self::Chapters => "chapters",
            Self::Pages => "pages",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "manga" => Some(Self::Manga),
            "chapters" => Some(Self::Chapters),
            "pages" => Some(Self::Pages),
            _ => None,
        }
    }
}

/// Durable snapshot of crawl progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub phase: Phase,
    /// Page cursor; the next page to fetch on resume.
    pub current_page: i64,
    pub total_processed: u64,
    /// Last manga external id handled in the chapters phase.
    #[serde(default)]
    pub last_manga_id: String,
    /// Last chapter external id handled in the pages phase.
    #[serde(default)]
    pub last_chapter_id: String,
    pub start_time: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    #[serde(default)]
    pub estimated_total: u64,
    #[serde(default)]
    pub error_count: u64,
    #[serde(default)]
    pub success_count: u64,
}

impl Checkpoint {
    /// A fresh checkpoint for a phase starting now.
    pub fn new(phase: Phase, start_time: DateTime<Utc>) -> Self {
        Self {
            phase,
            current_page: 1,
            total_processed: 0,
            last_manga_id: String::new(),
            last_chapter_id: String::new(),
            start_time,
            last_update: start_time,
            estimated_total: 0,
            error_count: 0,
            success_count: 0,
        }
    }
}
