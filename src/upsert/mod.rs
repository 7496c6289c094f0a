//! Deduplication and upsert engine.
//!
//! Decides, for every fetched entity, whether it matches an existing catalog
//! record and whether to insert, update or skip it. All functions run inside
//! a caller-owned [`CatalogTx`](crate::repository::CatalogTx) so that one
//! fetched page is applied atomically.

mod chapter;
mod manga;
mod similarity;
mod taxonomy;

pub use chapter::{page_records, replace_chapter_pages, save_chapters, ChapterSaveStats};
pub use manga::{comic_fields, save_manga, MangaOutcome};
pub use similarity::{find_duplicates, similarity_score, DuplicateMatch, MAX_CANDIDATES};
pub use taxonomy::save_taxonomy;

/// Score at or above which an incoming title is treated as already known.
pub const DUPLICATE_THRESHOLD: f64 = 0.9;

/// Scores at or below this are not considered matches at all.
pub const MATCH_FLOOR: f64 = 0.5;
