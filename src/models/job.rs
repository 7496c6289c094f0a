//! Crawl job records for the job tracker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a crawl job does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlMode {
    Genres,
    Formats,
    Types,
    Authors,
    Artists,
    Manga,
    Chapters,
    Pages,
    /// All five taxonomy sweeps.
    Master,
    /// Master data, manga, chapters, then pages.
    All,
}

impl CrawlMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Genres => "genres",
            Self::Formats => "formats",
            Self::Types => "types",
            Self::Authors => "authors",
            Self::Artists => "artists",
            Self::Manga => "manga",
            Self::Chapters => "chapters",
            Self::Pages => "pages",
            Self::Master => "master",
            Self::All => "all",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "genres" => Some(Self::Genres),
            "formats" => Some(Self::Formats),
            "types" => Some(Self::Types),
            "authors" => Some(Self::Authors),
            "artists" => Some(Self::Artists),
            "manga" => Some(Self::Manga),
            "chapters" => Some(Self::Chapters),
            "pages" => Some(Self::Pages),
            "master" | "auto" => Some(Self::Master),
            "all" => Some(Self::All),
            _ => None,
        }
    }
}

impl std::fmt::Display for CrawlMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of one crawl invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlRequest {
    pub mode: CrawlMode,
    #[serde(default)]
    pub start_page: i64,
    /// Last manga page, or -1 for no bound.
    #[serde(default)]
    pub end_page: i64,
    #[serde(default)]
    pub batch_size: usize,
    /// Single manga external id for `chapters`; `all` or absent means every comic.
    #[serde(default)]
    pub manga_id: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
}

impl CrawlRequest {
    pub fn new(mode: CrawlMode) -> Self {
        Self {
            mode,
            start_page: 0,
            end_page: 0,
            batch_size: 0,
            manga_id: None,
            dry_run: false,
        }
    }

    /// Fill unset fields: batch size 10, pages 1..10.
    pub fn with_defaults(mut self) -> Self {
        if self.batch_size == 0 {
            self.batch_size = 10;
        }
        if self.end_page == 0 {
            self.end_page = 10;
        }
        if self.start_page <= 0 {
            self.start_page = 1;
        }
        self
    }

    /// The single manga targeted by a chapters crawl, if any.
    pub fn single_manga(&self) -> Option<&str> {
        match self.manga_id.as_deref() {
            None | Some("") | Some("all") => None,
            Some(id) => Some(id),
        }
    }
}

/// Job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Step-level progress of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    pub current_step: String,
    pub total_steps: u32,
    pub completed_steps: u32,
    pub percentage: f64,
}

impl JobProgress {
    pub fn starting() -> Self {
        Self {
            current_step: "Starting...".to_string(),
            total_steps: 1,
            completed_steps: 0,
            percentage: 0.0,
        }
    }

    pub fn set(&mut self, step: &str, completed: u32, total: u32) {
        self.current_step = step.to_string();
        self.completed_steps = completed;
        self.total_steps = total;
        if total > 0 {
            self.percentage = f64::from(completed) / f64::from(total) * 100.0;
        }
    }
}

/// In-memory record of one crawl invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlJob {
    pub id: String,
    pub mode: CrawlMode,
    pub status: JobStatus,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub progress: JobProgress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CrawlJob {
    pub fn new(id: String, mode: CrawlMode, start_time: DateTime<Utc>) -> Self {
        Self {
            id,
            mode,
            status: JobStatus::Running,
            start_time,
            end_time: None,
            progress: JobProgress::starting(),
            error: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == JobStatus::Running
    }

    /// Wall time since start, or until end for finished jobs.
    pub fn elapsed(&self, now: DateTime<Utc>) -> chrono::Duration {
        self.end_time.unwrap_or(now) - self.start_time
    }
}
