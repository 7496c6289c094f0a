//! SQLite-backed catalog.

mod tx;

pub use tx::SqliteTx;

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use super::{parse_datetime, CatalogStats, CatalogStore, CatalogTx, Result, StoreError};
use crate::config::StoreConfig;
use crate::models::{
    ChapterRecord, ComicRecord, ComicStatus, DataSource, NewComic, PageRecord, TaxonomyKind,
};

/// Catalog stored in one SQLite file, opened per operation.
#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    db_path: PathBuf,
    config: StoreConfig,
}

impl SqliteCatalog {
    /// Open (creating if needed) the catalog at `db_path`.
    pub fn new(db_path: &Path, config: StoreConfig) -> Result<Self> {
        let catalog = Self {
            db_path: db_path.to_path_buf(),
            config,
        };
        catalog.init_schema()?;
        Ok(catalog)
    }

    pub fn database_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self, busy_timeout_secs: u64) -> Result<Connection> {
        let conn = Connection::open(&self.db_path).map_err(|source| StoreError::Open {
            path: self.db_path.clone(),
            source,
        })?;
        conn.busy_timeout(Duration::from_secs(busy_timeout_secs))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    fn read(&self) -> Result<Connection> {
        self.connect(self.config.read_timeout_secs)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect(self.config.write_timeout_secs)?;
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS comics (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                alternative_title TEXT,
                description TEXT,
                status TEXT NOT NULL DEFAULT 'On Going',
                country_id TEXT,

                -- Counters, overwritten from the external snapshot
                view_count INTEGER NOT NULL DEFAULT 0,
                vote_count INTEGER NOT NULL DEFAULT 0,
                bookmark_count INTEGER NOT NULL DEFAULT 0,

                cover_image_url TEXT,
                created_date TEXT,
                rank REAL,
                release_year INTEGER,

                external_id TEXT UNIQUE,
                data_source TEXT NOT NULL DEFAULT 'manual',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS chapters (
                id TEXT PRIMARY KEY,
                comic_id TEXT NOT NULL REFERENCES comics(id) ON DELETE CASCADE,
                external_id TEXT UNIQUE,
                chapter_number REAL NOT NULL,
                title TEXT,
                release_date TEXT,
                view_count INTEGER NOT NULL DEFAULT 0,
                thumbnail_image_url TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS pages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chapter_id TEXT NOT NULL REFERENCES chapters(id) ON DELETE CASCADE,
                page_number INTEGER NOT NULL,
                image_url TEXT NOT NULL,
                image_url_low TEXT,
                UNIQUE(chapter_id, page_number)
            );

            CREATE TABLE IF NOT EXISTS genres (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS formats (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS types (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS authors (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS artists (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Comic to taxonomy links, replaced wholesale per comic
            CREATE TABLE IF NOT EXISTS comic_genres (
                comic_id TEXT NOT NULL REFERENCES comics(id) ON DELETE CASCADE,
                genre_id INTEGER NOT NULL REFERENCES genres(id) ON DELETE CASCADE,
                PRIMARY KEY (comic_id, genre_id)
            );
            CREATE TABLE IF NOT EXISTS comic_formats (
                comic_id TEXT NOT NULL REFERENCES comics(id) ON DELETE CASCADE,
                format_id INTEGER NOT NULL REFERENCES formats(id) ON DELETE CASCADE,
                PRIMARY KEY (comic_id, format_id)
            );
            CREATE TABLE IF NOT EXISTS comic_authors (
                comic_id TEXT NOT NULL REFERENCES comics(id) ON DELETE CASCADE,
                author_id INTEGER NOT NULL REFERENCES authors(id) ON DELETE CASCADE,
                PRIMARY KEY (comic_id, author_id)
            );
            CREATE TABLE IF NOT EXISTS comic_artists (
                comic_id TEXT NOT NULL REFERENCES comics(id) ON DELETE CASCADE,
                artist_id INTEGER NOT NULL REFERENCES artists(id) ON DELETE CASCADE,
                PRIMARY KEY (comic_id, artist_id)
            );

            CREATE INDEX IF NOT EXISTS idx_comics_title
                ON comics(title COLLATE NOCASE);
            CREATE INDEX IF NOT EXISTS idx_chapters_comic_number
                ON chapters(comic_id, chapter_number);
            CREATE INDEX IF NOT EXISTS idx_pages_chapter
                ON pages(chapter_id, page_number);
        "#,
        )?;
        Ok(())
    }
}

impl CatalogStore for SqliteCatalog {
    fn transaction<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&dyn CatalogTx) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        let mut conn = self.connect(self.config.write_timeout_secs)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::from)?;

        // Dropping `tx` on the error path rolls it back.
        let result = f(&SqliteTx::new(&tx))?;

        tx.commit().map_err(StoreError::from)?;
        Ok(result)
    }

    fn comic_external_ids(&self) -> Result<Vec<String>> {
        let conn = self.read()?;
        let mut stmt = conn.prepare(
            "SELECT external_id FROM comics WHERE external_id IS NOT NULL ORDER BY rowid",
        )?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn chapters_missing_pages(&self, comic_external_id: Option<&str>) -> Result<Vec<String>> {
        let conn = self.read()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT ch.external_id
            FROM chapters ch
            JOIN comics c ON ch.comic_id = c.id
            WHERE ch.external_id IS NOT NULL
              AND (?1 IS NULL OR c.external_id = ?1)
              AND NOT EXISTS (SELECT 1 FROM pages p WHERE p.chapter_id = ch.id)
            ORDER BY c.rowid, ch.chapter_number
            "#,
        )?;
        let ids = stmt
            .query_map(params![comic_external_id], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn comic_by_external_id(&self, external_id: &str) -> Result<Option<ComicRecord>> {
        let conn = self.read()?;
        let record = conn
            .query_row(
                r#"
                SELECT id, title, alternative_title, description, status, country_id,
                       view_count, vote_count, bookmark_count, cover_image_url,
                       created_date, rank, release_year, external_id, data_source, updated_at
                FROM comics WHERE external_id = ?
                "#,
                params![external_id],
                |row| {
                    let status: String = row.get(4)?;
                    let source: String = row.get(14)?;
                    let updated_at: String = row.get(15)?;
                    Ok(ComicRecord {
                        id: row.get(0)?,
                        fields: NewComic {
                            title: row.get(1)?,
                            alternative_title: row.get(2)?,
                            description: row.get(3)?,
                            status: ComicStatus::from_str(&status).unwrap_or(ComicStatus::OnGoing),
                            country_id: row.get(5)?,
                            view_count: row.get(6)?,
                            vote_count: row.get(7)?,
                            bookmark_count: row.get(8)?,
                            cover_image_url: row.get(9)?,
                            created_date: row.get(10)?,
                            rank: row.get(11)?,
                            release_year: row.get(12)?,
                        },
                        external_id: row.get(13)?,
                        data_source: DataSource::from_str(&source).unwrap_or(DataSource::Manual),
                        updated_at: parse_datetime(&updated_at),
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    fn max_chapter_number(&self, comic_external_id: &str) -> Result<Option<f64>> {
        let conn = self.read()?;
        let max: Option<f64> = conn.query_row(
            r#"
            SELECT MAX(ch.chapter_number)
            FROM chapters ch
            JOIN comics c ON ch.comic_id = c.id
            WHERE c.external_id = ?
            "#,
            params![comic_external_id],
            |row| row.get(0),
        )?;
        Ok(max)
    }

    fn chapters_for_comic(&self, comic_external_id: &str) -> Result<Vec<ChapterRecord>> {
        let conn = self.read()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT ch.id, ch.comic_id, ch.external_id, ch.chapter_number, ch.title
            FROM chapters ch
            JOIN comics c ON ch.comic_id = c.id
            WHERE c.external_id = ?
            ORDER BY ch.chapter_number
            "#,
        )?;
        let chapters = stmt
            .query_map(params![comic_external_id], |row| {
                Ok(ChapterRecord {
                    id: row.get(0)?,
                    comic_id: row.get(1)?,
                    external_id: row.get(2)?,
                    chapter_number: row.get(3)?,
                    title: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(chapters)
    }

    fn pages_for_chapter(&self, chapter_external_id: &str) -> Result<Vec<PageRecord>> {
        let conn = self.read()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT p.page_number, p.image_url, p.image_url_low
            FROM pages p
            JOIN chapters ch ON p.chapter_id = ch.id
            WHERE ch.external_id = ?
            ORDER BY p.page_number
            "#,
        )?;
        let pages = stmt
            .query_map(params![chapter_external_id], |row| {
                Ok(PageRecord {
                    page_number: row.get(0)?,
                    image_url: row.get(1)?,
                    image_url_low: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(pages)
    }

    fn taxonomy_names(&self, kind: TaxonomyKind) -> Result<Vec<String>> {
        let conn = self.read()?;
        let mut stmt = conn.prepare(&format!("SELECT name FROM {} ORDER BY name", kind.table()))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn comic_links(&self, comic_id: &str, kind: TaxonomyKind) -> Result<Vec<String>> {
        let Some(link_table) = kind.link_table() else {
            return Ok(Vec::new());
        };
        let conn = self.read()?;
        let sql = format!(
            "SELECT t.name FROM {link} l JOIN {table} t ON l.{col} = t.id \
             WHERE l.comic_id = ? ORDER BY t.name",
            link = link_table,
            table = kind.table(),
            col = kind.link_column(),
        );
        let mut stmt = conn.prepare(&sql)?;
        let names = stmt
            .query_map(params![comic_id], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn stats(&self) -> Result<CatalogStats> {
        let conn = self.read()?;
        let count = |table: &str| -> Result<u64> {
            let n: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
            Ok(n as u64)
        };
        Ok(CatalogStats {
            comics: count("comics")?,
            chapters: count("chapters")?,
            pages: count("pages")?,
            genres: count(TaxonomyKind::Genre.table())?,
            formats: count(TaxonomyKind::Format.table())?,
            types: count(TaxonomyKind::Type.table())?,
            authors: count(TaxonomyKind::Author.table())?,
            artists: count(TaxonomyKind::Artist.table())?,
        })
    }
}
