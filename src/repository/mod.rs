//! Catalog store: persistence for comics, chapters, pages and taxonomy.
//!
//! The engine talks to the store through [`CatalogStore`] (reads and
//! transaction boundaries) and [`CatalogTx`] (writes inside one atomic
//! transaction). [`SqliteCatalog`] is the rusqlite-backed implementation.

mod catalog;

pub use catalog::{SqliteCatalog, SqliteTx};

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::models::{
    ChapterRecord, ComicCandidate, ComicRecord, DataSource, NewChapter, NewComic, PageRecord,
    TaxonomyKind,
};

/// Catalog store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open catalog {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Row counts per table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub comics: u64,
    pub chapters: u64,
    pub pages: u64,
    pub genres: u64,
    pub formats: u64,
    pub types: u64,
    pub authors: u64,
    pub artists: u64,
}

/// Read access and transaction boundaries of the catalog.
pub trait CatalogStore: Send + Sync + 'static {
    /// Run `f` inside one atomic write transaction.
    ///
    /// The transaction commits when `f` returns `Ok` and rolls back on any
    /// error, leaving the store as it was before the call.
    fn transaction<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&dyn CatalogTx) -> std::result::Result<T, E>,
        E: From<StoreError>;

    /// External ids of every comic that has one, in insertion order.
    fn comic_external_ids(&self) -> Result<Vec<String>>;

    /// External ids of chapters with no page rows, optionally for one comic.
    fn chapters_missing_pages(&self, comic_external_id: Option<&str>) -> Result<Vec<String>>;

    fn comic_by_external_id(&self, external_id: &str) -> Result<Option<ComicRecord>>;

    /// Highest stored chapter number of a comic, `None` without chapters.
    fn max_chapter_number(&self, comic_external_id: &str) -> Result<Option<f64>>;

    fn chapters_for_comic(&self, comic_external_id: &str) -> Result<Vec<ChapterRecord>>;

    /// Pages of a chapter ordered by page number.
    fn pages_for_chapter(&self, chapter_external_id: &str) -> Result<Vec<PageRecord>>;

    /// Every stored name of one taxonomy kind, sorted.
    fn taxonomy_names(&self, kind: TaxonomyKind) -> Result<Vec<String>>;

    /// Taxonomy names linked to a comic, sorted.
    fn comic_links(&self, comic_id: &str, kind: TaxonomyKind) -> Result<Vec<String>>;

    fn stats(&self) -> Result<CatalogStats>;
}

/// Writes available inside a catalog transaction.
pub trait CatalogTx {
    /// Insert a taxonomy row by name or bump its timestamp; returns its id.
    fn upsert_taxonomy(&self, kind: TaxonomyKind, name: &str) -> Result<i64>;

    fn taxonomy_id(&self, kind: TaxonomyKind, name: &str) -> Result<Option<i64>>;

    /// Comics that could match `title` or `external_id`.
    ///
    /// Returns every row with the same external id, the same title ignoring
    /// case, or a title containing (or contained in) `title`.
    fn comic_candidates(&self, title: &str, external_id: &str) -> Result<Vec<ComicCandidate>>;

    fn comic_id_by_external_id(&self, external_id: &str) -> Result<Option<String>>;

    fn insert_comic(
        &self,
        id: &str,
        comic: &NewComic,
        external_id: &str,
        source: DataSource,
    ) -> Result<()>;

    /// Overwrite every mutable field and bump the timestamp.
    fn update_comic(&self, id: &str, comic: &NewComic) -> Result<()>;

    /// Give a comic lacking an external id the incoming one, marking it mapped.
    ///
    /// Returns false when the comic already had an external id.
    fn map_external_id(&self, id: &str, external_id: &str) -> Result<bool>;

    /// Replace every link of one kind for a comic.
    fn replace_comic_links(&self, comic_id: &str, kind: TaxonomyKind, ids: &[i64]) -> Result<()>;

    /// A chapter matching by external id, or else by (comic, number).
    fn find_chapter(
        &self,
        external_id: &str,
        comic_id: &str,
        chapter_number: f64,
    ) -> Result<Option<String>>;

    fn insert_chapter(&self, id: &str, comic_id: &str, chapter: &NewChapter) -> Result<()>;

    fn update_chapter(&self, id: &str, comic_id: &str, chapter: &NewChapter) -> Result<()>;

    fn chapter_id_by_external_id(&self, external_id: &str) -> Result<Option<String>>;

    /// Delete all pages of a chapter and insert `pages`; returns the count.
    fn replace_pages(&self, chapter_id: &str, pages: &[PageRecord]) -> Result<usize>;
}

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}
