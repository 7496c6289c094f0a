//! Manga upsert with duplicate detection.

use tracing::{debug, warn};
use uuid::Uuid;

use super::similarity::find_duplicates;
use super::DUPLICATE_THRESHOLD;
use crate::models::{
    normalize_country, ComicStatus, DataSource, ExternalManga, ExternalTaxonomy, NewComic,
    TaxonomyKind,
};
use crate::repository::{CatalogTx, Result};

/// What happened to one incoming manga.
#[derive(Debug, Clone, PartialEq)]
pub enum MangaOutcome {
    Inserted { id: String },
    Updated { id: String },
    /// Matched an existing title; nothing was written except an optional
    /// external id backfill.
    SkippedDuplicate {
        existing_id: String,
        score: f64,
        mapped: bool,
    },
}

impl MangaOutcome {
    pub fn is_saved(&self) -> bool {
        !matches!(self, Self::SkippedDuplicate { .. })
    }
}

/// Translate an external snapshot into stored comic fields.
pub fn comic_fields(manga: &ExternalManga) -> NewComic {
    NewComic {
        title: manga.title.trim().to_string(),
        alternative_title: manga.alternative_title.clone(),
        description: manga.description.clone(),
        status: ComicStatus::from_code(manga.status),
        country_id: manga
            .country_id
            .as_deref()
            .filter(|c| !c.is_empty())
            .map(normalize_country),
        view_count: manga.view_count.unwrap_or(0),
        vote_count: manga.vote_count.unwrap_or(0),
        bookmark_count: manga.bookmark_count.unwrap_or(0),
        cover_image_url: manga.cover_image_url.clone(),
        created_date: manga.created_at.clone(),
        rank: manga.rank,
        release_year: manga.release_year,
    }
}

/// Insert, update or skip one manga, then sync its taxonomy links.
pub fn save_manga(tx: &dyn CatalogTx, manga: &ExternalManga) -> Result<MangaOutcome> {
    let fields = comic_fields(manga);
    let duplicates = find_duplicates(tx, &fields.title, &manga.id)?;

    if let Some(best) = duplicates.first() {
        let same_record = best.external_id.as_deref() == Some(manga.id.as_str());
        if !same_record && best.score >= DUPLICATE_THRESHOLD {
            let mapped = if best.external_id.is_none() {
                tx.map_external_id(&best.id, &manga.id)?
            } else {
                false
            };
            debug!(
                "Skipping duplicate manga {} (matches {}, score {:.2})",
                fields.title, best.title, best.score
            );
            return Ok(MangaOutcome::SkippedDuplicate {
                existing_id: best.id.clone(),
                score: best.score,
                mapped,
            });
        }
    }

    let (comic_id, outcome) = match tx.comic_id_by_external_id(&manga.id)? {
        Some(id) => {
            tx.update_comic(&id, &fields)?;
            (id.clone(), MangaOutcome::Updated { id })
        }
        None => {
            let id = Uuid::new_v4().to_string();
            tx.insert_comic(&id, &fields, &manga.id, DataSource::Crawled)?;
            (id.clone(), MangaOutcome::Inserted { id })
        }
    };

    if let Some(taxonomy) = &manga.taxonomy {
        sync_links(tx, &comic_id, taxonomy)?;
    }

    Ok(outcome)
}

/// Replace each link table for which the snapshot carries entries.
fn sync_links(tx: &dyn CatalogTx, comic_id: &str, taxonomy: &ExternalTaxonomy) -> Result<()> {
    for kind in TaxonomyKind::ALL {
        if kind.link_table().is_none() {
            continue;
        }
        let names = taxonomy.names(kind);
        if names.is_empty() {
            continue;
        }

        let mut ids = Vec::with_capacity(names.len());
        for name in &names {
            match tx.taxonomy_id(kind, name)? {
                Some(id) => ids.push(id),
                None => warn!("{} not found: {}", kind.as_str(), name),
            }
        }
        tx.replace_comic_links(comic_id, kind, &ids)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::models::NamedEntry;
    use crate::repository::{CatalogStore, SqliteCatalog, StoreError};
    use tempfile::TempDir;

    fn setup() -> (TempDir, SqliteCatalog) {
        let dir = tempfile::tempdir().unwrap();
        let catalog = SqliteCatalog::new(&dir.path().join("catalog.db"), StoreConfig::default())
            .unwrap();
        (dir, catalog)
    }

    fn manga(id: &str, title: &str) -> ExternalManga {
        serde_json::from_value(serde_json::json!({
            "manga_id": id,
            "title": title,
            "status": 2,
            "country_id": "JP",
            "view_count": 10,
        }))
        .unwrap()
    }

    fn save(catalog: &SqliteCatalog, m: &ExternalManga) -> MangaOutcome {
        catalog.transaction(|tx| save_manga(tx, m)).unwrap()
    }

    #[test]
    fn test_insert_then_update_same_row() {
        let (_dir, catalog) = setup();
        let first = save(&catalog, &manga("ext-1", "Foo"));
        let MangaOutcome::Inserted { id } = first else {
            panic!("expected insert, got {:?}", first);
        };

        let mut changed = manga("ext-1", "Foo");
        changed.view_count = Some(99);
        assert_eq!(
            save(&catalog, &changed),
            MangaOutcome::Updated { id: id.clone() }
        );

        let record = catalog.comic_by_external_id("ext-1").unwrap().unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.fields.view_count, 99);
        assert_eq!(record.fields.status, ComicStatus::End);
        assert_eq!(record.fields.country_id.as_deref(), Some("JPN"));
        assert_eq!(record.data_source, DataSource::Crawled);
        assert_eq!(catalog.stats().unwrap().comics, 1);
    }

    #[test]
    fn test_renamed_title_still_updates_by_external_id() {
        let (_dir, catalog) = setup();
        save(&catalog, &manga("ext-1", "Foo"));
        let outcome = save(&catalog, &manga("ext-1", "Completely Renamed"));
        assert!(matches!(outcome, MangaOutcome::Updated { .. }));
        assert_eq!(catalog.stats().unwrap().comics, 1);
    }

    #[test]
    fn test_same_title_different_id_is_skipped() {
        let (_dir, catalog) = setup();
        save(&catalog, &manga("ext-1", "Foo"));
        let outcome = save(&catalog, &manga("ext-2", "FOO"));
        assert!(matches!(
            outcome,
            MangaOutcome::SkippedDuplicate { mapped: false, .. }
        ));
        assert_eq!(catalog.stats().unwrap().comics, 1);
        assert!(catalog.comic_by_external_id("ext-2").unwrap().is_none());
    }

    #[test]
    fn test_manual_record_gets_mapped() {
        let (_dir, catalog) = setup();
        catalog
            .transaction(|tx| {
                tx.insert_comic("manual-1", &comic_fields(&manga("tmp", "Foo")), "tmp", DataSource::Manual)
            })
            .unwrap();
        let conn = rusqlite::Connection::open(catalog.database_path()).unwrap();
        conn.execute("UPDATE comics SET external_id = NULL", []).unwrap();

        let outcome = save(&catalog, &manga("ext-7", "foo"));
        assert_eq!(
            outcome,
            MangaOutcome::SkippedDuplicate {
                existing_id: "manual-1".to_string(),
                score: 0.9,
                mapped: true,
            }
        );
        let record = catalog.comic_by_external_id("ext-7").unwrap().unwrap();
        assert_eq!(record.id, "manual-1");
        assert_eq!(record.data_source, DataSource::Mapped);
    }

    #[test]
    fn test_substring_match_does_not_skip() {
        let (_dir, catalog) = setup();
        save(&catalog, &manga("ext-1", "Foo"));
        let outcome = save(&catalog, &manga("ext-2", "Foo Returns"));
        assert!(matches!(outcome, MangaOutcome::Inserted { .. }));
        assert_eq!(catalog.stats().unwrap().comics, 2);
    }

    #[test]
    fn test_links_synced_for_known_taxonomy() {
        let (_dir, catalog) = setup();
        catalog
            .transaction(|tx| {
                tx.upsert_taxonomy(TaxonomyKind::Genre, "Action")?;
                tx.upsert_taxonomy(TaxonomyKind::Author, "Alice")
            })
            .unwrap();

        let mut m = manga("ext-1", "Foo");
        m.taxonomy = Some(ExternalTaxonomy {
            genre: vec![
                NamedEntry { slug: None, name: "Action".to_string() },
                NamedEntry { slug: None, name: "Unknown".to_string() },
            ],
            author: vec![NamedEntry { slug: None, name: "Alice".to_string() }],
            ..Default::default()
        });
        let MangaOutcome::Inserted { id } = save(&catalog, &m) else {
            panic!("expected insert");
        };

        assert_eq!(catalog.comic_links(&id, TaxonomyKind::Genre).unwrap(), vec!["Action"]);
        assert_eq!(catalog.comic_links(&id, TaxonomyKind::Author).unwrap(), vec!["Alice"]);
    }

    #[test]
    fn test_error_mid_page_rolls_back_whole_page() {
        let (_dir, catalog) = setup();
        let page = vec![manga("ext-1", "Foo"), manga("ext-2", "Bar")];
        let result: std::result::Result<(), StoreError> = catalog.transaction(|tx| {
            for m in &page {
                save_manga(tx, m)?;
            }
            Err(StoreError::NotFound {
                kind: "manga",
                id: "forced".to_string(),
            })
        });
        assert!(result.is_err());
        assert_eq!(catalog.stats().unwrap().comics, 0);
    }
}
