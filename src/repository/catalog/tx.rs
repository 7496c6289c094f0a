//! Writes inside one catalog transaction.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{ComicCandidate, DataSource, NewChapter, NewComic, PageRecord, TaxonomyKind};
use crate::repository::{CatalogTx, Result};

/// A borrowed connection with an open transaction.
pub struct SqliteTx<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteTx<'a> {
    pub(crate) fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl CatalogTx for SqliteTx<'_> {
    fn upsert_taxonomy(&self, kind: TaxonomyKind, name: &str) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let id: i64 = self.conn.query_row(
            &format!(
                r#"
                INSERT INTO {} (name, created_at, updated_at) VALUES (?1, ?2, ?2)
                ON CONFLICT(name) DO UPDATE SET updated_at = excluded.updated_at
                RETURNING id
                "#,
                kind.table()
            ),
            params![name, now],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn taxonomy_id(&self, kind: TaxonomyKind, name: &str) -> Result<Option<i64>> {
        let id = self
            .conn
            .query_row(
                &format!("SELECT id FROM {} WHERE name = ?", kind.table()),
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn comic_candidates(&self, title: &str, external_id: &str) -> Result<Vec<ComicCandidate>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, title, external_id FROM comics
            WHERE (?2 <> '' AND external_id = ?2)
               OR lower(title) = lower(?1)
               OR (?1 <> '' AND title <> '' AND (
                    instr(lower(title), lower(?1)) > 0
                    OR instr(lower(?1), lower(title)) > 0))
            "#,
        )?;
        let candidates = stmt
            .query_map(params![title, external_id], |row| {
                Ok(ComicCandidate {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    external_id: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(candidates)
    }

    fn comic_id_by_external_id(&self, external_id: &str) -> Result<Option<String>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM comics WHERE external_id = ?",
                params![external_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn insert_comic(
        &self,
        id: &str,
        comic: &NewComic,
        external_id: &str,
        source: DataSource,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            r#"
            INSERT INTO comics (
                id, title, alternative_title, description, status, country_id,
                view_count, vote_count, bookmark_count, cover_image_url,
                created_date, rank, release_year, external_id, data_source,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?16)
            "#,
            params![
                id,
                comic.title,
                comic.alternative_title,
                comic.description,
                comic.status.as_str(),
                comic.country_id,
                comic.view_count,
                comic.vote_count,
                comic.bookmark_count,
                comic.cover_image_url,
                comic.created_date,
                comic.rank,
                comic.release_year,
                external_id,
                source.as_str(),
                now,
            ],
        )?;
        Ok(())
    }

    fn update_comic(&self, id: &str, comic: &NewComic) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            r#"
            UPDATE comics SET
                title = ?2, alternative_title = ?3, description = ?4, status = ?5,
                country_id = ?6, view_count = ?7, vote_count = ?8, bookmark_count = ?9,
                cover_image_url = ?10, rank = ?11, release_year = ?12, updated_at = ?13
            WHERE id = ?1
            "#,
            params![
                id,
                comic.title,
                comic.alternative_title,
                comic.description,
                comic.status.as_str(),
                comic.country_id,
                comic.view_count,
                comic.vote_count,
                comic.bookmark_count,
                comic.cover_image_url,
                comic.rank,
                comic.release_year,
                now,
            ],
        )?;
        Ok(())
    }

    fn map_external_id(&self, id: &str, external_id: &str) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            r#"
            UPDATE comics SET external_id = ?2, data_source = ?3, updated_at = ?4
            WHERE id = ?1 AND external_id IS NULL
            "#,
            params![id, external_id, DataSource::Mapped.as_str(), now],
        )?;
        Ok(changed > 0)
    }

    fn replace_comic_links(&self, comic_id: &str, kind: TaxonomyKind, ids: &[i64]) -> Result<()> {
        let Some(link_table) = kind.link_table() else {
            return Ok(());
        };
        self.conn.execute(
            &format!("DELETE FROM {} WHERE comic_id = ?", link_table),
            params![comic_id],
        )?;
        let mut stmt = self.conn.prepare(&format!(
            "INSERT OR IGNORE INTO {} (comic_id, {}) VALUES (?1, ?2)",
            link_table,
            kind.link_column()
        ))?;
        for taxonomy_id in ids {
            stmt.execute(params![comic_id, taxonomy_id])?;
        }
        Ok(())
    }

    fn find_chapter(
        &self,
        external_id: &str,
        comic_id: &str,
        chapter_number: f64,
    ) -> Result<Option<String>> {
        let id = self
            .conn
            .query_row(
                r#"
                SELECT id FROM chapters
                WHERE external_id = ?1 OR (comic_id = ?2 AND chapter_number = ?3)
                ORDER BY CASE WHEN external_id = ?1 THEN 0 ELSE 1 END
                LIMIT 1
                "#,
                params![external_id, comic_id, chapter_number],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn insert_chapter(&self, id: &str, comic_id: &str, chapter: &NewChapter) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            r#"
            INSERT INTO chapters (
                id, comic_id, external_id, chapter_number, title, release_date,
                view_count, thumbnail_image_url, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            "#,
            params![
                id,
                comic_id,
                chapter.external_id,
                chapter.chapter_number,
                chapter.title,
                chapter.release_date,
                chapter.view_count,
                chapter.thumbnail_image_url,
                now,
            ],
        )?;
        Ok(())
    }

    fn update_chapter(&self, id: &str, comic_id: &str, chapter: &NewChapter) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            r#"
            UPDATE chapters SET
                comic_id = ?2, external_id = ?3, chapter_number = ?4, title = ?5,
                release_date = ?6, view_count = ?7, thumbnail_image_url = ?8, updated_at = ?9
            WHERE id = ?1
            "#,
            params![
                id,
                comic_id,
                chapter.external_id,
                chapter.chapter_number,
                chapter.title,
                chapter.release_date,
                chapter.view_count,
                chapter.thumbnail_image_url,
                now,
            ],
        )?;
        Ok(())
    }

    fn chapter_id_by_external_id(&self, external_id: &str) -> Result<Option<String>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM chapters WHERE external_id = ?",
                params![external_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn replace_pages(&self, chapter_id: &str, pages: &[PageRecord]) -> Result<usize> {
        self.conn
            .execute("DELETE FROM pages WHERE chapter_id = ?", params![chapter_id])?;
        let mut stmt = self.conn.prepare(
            r#"
            INSERT INTO pages (chapter_id, page_number, image_url, image_url_low)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )?;
        for page in pages {
            stmt.execute(params![
                chapter_id,
                page.page_number,
                page.image_url,
                page.image_url_low
            ])?;
        }
        Ok(pages.len())
    }
}
