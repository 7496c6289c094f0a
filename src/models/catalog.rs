//! Local catalog records and value translation tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Taxonomy categories, each stored in its own name-keyed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxonomyKind {
    Genre,
    Format,
    Type,
    Author,
    Artist,
}

impl TaxonomyKind {
    /// Master-data crawl order.
    pub const ALL: [TaxonomyKind; 5] = [
        Self::Genre,
        Self::Format,
        Self::Type,
        Self::Author,
        Self::Artist,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Genre => "genre",
            Self::Format => "format",
            Self::Type => "type",
            Self::Author => "author",
            Self::Artist => "artist",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "genre" | "genres" => Some(Self::Genre),
            "format" | "formats" => Some(Self::Format),
            "type" | "types" => Some(Self::Type),
            "author" | "authors" => Some(Self::Author),
            "artist" | "artists" => Some(Self::Artist),
            _ => None,
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            Self::Genre => "genres",
            Self::Format => "formats",
            Self::Type => "types",
            Self::Author => "authors",
            Self::Artist => "artists",
        }
    }

    /// Join table linking comics to this kind, if any.
    pub fn link_table(&self) -> Option<&'static str> {
        match self {
            Self::Genre => Some("comic_genres"),
            Self::Format => Some("comic_formats"),
            Self::Type => None,
            Self::Author => Some("comic_authors"),
            Self::Artist => Some("comic_artists"),
        }
    }

    /// Foreign key column inside the join table.
    pub fn link_column(&self) -> &'static str {
        match self {
            Self::Genre => "genre_id",
            Self::Format => "format_id",
            Self::Type => "type_id",
            Self::Author => "author_id",
            Self::Artist => "artist_id",
        }
    }

    /// Path segment of the list endpoint.
    pub fn endpoint(&self) -> &'static str {
        self.as_str()
    }

    /// Search-backed endpoints need the prefix sweep.
    pub fn is_search_backed(&self) -> bool {
        matches!(self, Self::Author | Self::Artist)
    }
}

/// Publication status of a comic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComicStatus {
    OnGoing,
    End,
    Hiatus,
    Break,
}

impl ComicStatus {
    /// Translate the upstream numeric code; unknown codes are on going.
    pub fn from_code(code: Option<i64>) -> Self {
        match code {
            Some(2) => Self::End,
            Some(3) => Self::Hiatus,
            Some(4) => Self::Break,
            _ => Self::OnGoing,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnGoing => "On Going",
            Self::End => "End",
            Self::Hiatus => "Hiatus",
            Self::Break => "Break",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "On Going" => Some(Self::OnGoing),
            "End" => Some(Self::End),
            "Hiatus" => Some(Self::Hiatus),
            "Break" => Some(Self::Break),
            _ => None,
        }
    }
}

/// Translate an upstream country code to the stored form.
pub fn normalize_country(code: &str) -> String {
    match code {
        "JP" => "JPN".to_string(),
        "KR" => "KR".to_string(),
        "CN" => "CN".to_string(),
        other => other.to_string(),
    }
}

/// How a comic row came to carry its external id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// Inserted directly from a crawl.
    Crawled,
    /// Pre-existing row matched by title and given the external id.
    Mapped,
    /// Entered by hand.
    Manual,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crawled => "crawled",
            Self::Mapped => "mapped",
            Self::Manual => "manual",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "crawled" => Some(Self::Crawled),
            "mapped" => Some(Self::Mapped),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

/// Mutable comic fields, overwritten wholesale on update.
#[derive(Debug, Clone, PartialEq)]
pub struct NewComic {
    pub title: String,
    pub alternative_title: Option<String>,
    pub description: Option<String>,
    pub status: ComicStatus,
    pub country_id: Option<String>,
    pub view_count: i64,
    pub vote_count: i64,
    pub bookmark_count: i64,
    pub cover_image_url: Option<String>,
    pub created_date: Option<String>,
    pub rank: Option<f64>,
    pub release_year: Option<i64>,
}

/// A stored comic.
#[derive(Debug, Clone, PartialEq)]
pub struct ComicRecord {
    pub id: String,
    pub fields: NewComic,
    pub external_id: Option<String>,
    pub data_source: DataSource,
    pub updated_at: DateTime<Utc>,
}

/// A comic considered as a duplicate candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComicCandidate {
    pub id: String,
    pub title: String,
    pub external_id: Option<String>,
}

/// Mutable chapter fields.
#[derive(Debug, Clone, PartialEq)]
pub struct NewChapter {
    pub external_id: String,
    pub chapter_number: f64,
    pub title: Option<String>,
    pub release_date: Option<String>,
    pub view_count: i64,
    pub thumbnail_image_url: Option<String>,
}

/// A stored chapter.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterRecord {
    pub id: String,
    pub comic_id: String,
    pub external_id: Option<String>,
    pub chapter_number: f64,
    pub title: Option<String>,
}

/// A stored page image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    pub page_number: i64,
    pub image_url: String,
    pub image_url_low: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ComicStatus::from_code(Some(1)), ComicStatus::OnGoing);
        assert_eq!(ComicStatus::from_code(Some(2)).as_str(), "End");
        assert_eq!(ComicStatus::from_code(Some(3)).as_str(), "Hiatus");
        assert_eq!(ComicStatus::from_code(Some(4)).as_str(), "Break");
        assert_eq!(ComicStatus::from_code(Some(9)), ComicStatus::OnGoing);
        assert_eq!(ComicStatus::from_code(None), ComicStatus::OnGoing);
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            ComicStatus::OnGoing,
            ComicStatus::End,
            ComicStatus::Hiatus,
            ComicStatus::Break,
        ] {
            assert_eq!(ComicStatus::from_str(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_country_translation() {
        assert_eq!(normalize_country("JP"), "JPN");
        assert_eq!(normalize_country("KR"), "KR");
        assert_eq!(normalize_country("CN"), "CN");
        assert_eq!(normalize_country("ID"), "ID");
    }

    #[test]
    fn test_taxonomy_tables() {
        assert_eq!(TaxonomyKind::Genre.table(), "genres");
        assert_eq!(TaxonomyKind::Type.link_table(), None);
        assert_eq!(TaxonomyKind::Author.link_table(), Some("comic_authors"));
        assert!(TaxonomyKind::Artist.is_search_backed());
        assert!(!TaxonomyKind::Format.is_search_backed());
        assert_eq!(TaxonomyKind::from_str("artists"), Some(TaxonomyKind::Artist));
        assert_eq!(TaxonomyKind::from_str("manga"), None);
    }

    #[test]
    fn test_data_source_roundtrip() {
        for source in [DataSource::Crawled, DataSource::Mapped, DataSource::Manual] {
            assert_eq!(DataSource::from_str(source.as_str()), Some(source));
        }
    }
}
