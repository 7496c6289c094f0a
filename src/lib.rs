//! komiksync - manga catalog crawler and incremental synchronization engine.
//!
//! Ingests a paginated external manga catalog (titles, chapters, page images
//! and taxonomy) into a local SQLite catalog, deduplicating titles across
//! sweeps, checkpointing long crawls, and polling for newly published
//! chapters.

pub mod autoupdate;
pub mod checkpoint;
pub mod cli;
pub mod clock;
pub mod config;
pub mod crawler;
pub mod fetch;
pub mod jobs;
pub mod models;
pub mod repository;
pub mod upsert;

#[cfg(test)]
pub(crate) mod test_support;
