//! Data models for komiksync.

mod catalog;
mod checkpoint;
mod external;
mod job;

pub use catalog::{
    normalize_country, ChapterRecord, ComicCandidate, ComicRecord, ComicStatus, DataSource,
    NewChapter, NewComic, PageRecord, TaxonomyKind,
};
pub use checkpoint::{Checkpoint, Phase};
pub use external::{
    ChapterDetail, ChapterPages, DetailData, Envelope, ExternalChapter, ExternalManga,
    ExternalTaxonomy, ListData, ListPage, Meta, NamedEntry, Pagination,
};
pub use job::{CrawlJob, CrawlMode, CrawlRequest, JobProgress, JobStatus};
