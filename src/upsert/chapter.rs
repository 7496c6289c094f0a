//! Chapter upsert and page replacement.

use uuid::Uuid;

use crate::models::{ChapterDetail, ExternalChapter, NewChapter, PageRecord};
use crate::repository::{CatalogTx, Result, StoreError};

/// Counts from saving one page of chapters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChapterSaveStats {
    pub inserted: usize,
    pub updated: usize,
}

/// Save chapters of the manga with external id `manga_external_id`.
///
/// A chapter matches an existing row by external id or by (comic, chapter
/// number); matches are overwritten, the rest inserted. Fails with
/// [`StoreError::NotFound`] when the manga is not stored.
pub fn save_chapters(
    tx: &dyn CatalogTx,
    manga_external_id: &str,
    chapters: &[ExternalChapter],
) -> Result<ChapterSaveStats> {
    let comic_id = tx
        .comic_id_by_external_id(manga_external_id)?
        .ok_or_else(|| StoreError::NotFound {
            kind: "manga",
            id: manga_external_id.to_string(),
        })?;

    let mut stats = ChapterSaveStats::default();
    for chapter in chapters {
        let fields = NewChapter {
            external_id: chapter.id.clone(),
            chapter_number: chapter.chapter_number,
            title: chapter.chapter_title.clone(),
            release_date: chapter.release_date.clone(),
            view_count: chapter.view_count.unwrap_or(0),
            thumbnail_image_url: chapter.thumbnail_image_url.clone(),
        };

        match tx.find_chapter(&chapter.id, &comic_id, chapter.chapter_number)? {
            Some(existing) => {
                tx.update_chapter(&existing, &comic_id, &fields)?;
                stats.updated += 1;
            }
            None => {
                tx.insert_chapter(&Uuid::new_v4().to_string(), &comic_id, &fields)?;
                stats.inserted += 1;
            }
        }
    }
    Ok(stats)
}

/// Build page rows from a chapter detail, numbered from 1.
pub fn page_records(detail: &ChapterDetail) -> Vec<PageRecord> {
    detail
        .chapter
        .data
        .iter()
        .enumerate()
        .map(|(i, filename)| PageRecord {
            page_number: i as i64 + 1,
            image_url: format!("{}{}{}", detail.base_url, detail.chapter.path, filename),
            image_url_low: (!detail.base_url_low.is_empty()).then(|| {
                format!("{}{}{}", detail.base_url_low, detail.chapter.path, filename)
            }),
        })
        .collect()
}

/// Replace every page row of a chapter; returns the number of pages.
pub fn replace_chapter_pages(
    tx: &dyn CatalogTx,
    chapter_external_id: &str,
    detail: &ChapterDetail,
) -> Result<usize> {
    let chapter_id = tx
        .chapter_id_by_external_id(chapter_external_id)?
        .ok_or_else(|| StoreError::NotFound {
            kind: "chapter",
            id: chapter_external_id.to_string(),
        })?;
    tx.replace_pages(&chapter_id, &page_records(detail))
}
