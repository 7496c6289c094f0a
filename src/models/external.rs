//! Wire models for the external catalog API.
//!
//! Every response is wrapped in an [`Envelope`]. List payloads appear either
//! as a flat array under `data` or nested as `data.data` with a
//! `data.pagination` block; both shapes decode into [`ListData`].

use serde::{Deserialize, Deserializer};

use super::catalog::TaxonomyKind;

/// Response envelope shared by every endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub retcode: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub meta: Option<Meta>,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub facet: Option<serde_json::Value>,
}

/// Envelope metadata. Every field is optional upstream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub page_size: Option<i64>,
    #[serde(default)]
    pub total_page: Option<i64>,
    #[serde(default)]
    pub total_record: Option<i64>,
}

/// Pagination block of nested list payloads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub page_size: Option<i64>,
    #[serde(default)]
    pub total: Option<i64>,
    #[serde(default)]
    pub total_page: Option<i64>,
}

/// A list payload in either of its two upstream shapes.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ListData<T> {
    Flat(Vec<T>),
    Nested {
        #[serde(default = "Vec::new")]
        data: Vec<T>,
        #[serde(default)]
        pagination: Option<Pagination>,
    },
}

/// A detail payload, either the object itself or nested under `data`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DetailData<T> {
    Nested { data: T },
    Direct(T),
}

impl<T> DetailData<T> {
    pub fn into_inner(self) -> T {
        match self {
            Self::Nested { data } => data,
            Self::Direct(data) => data,
        }
    }
}

/// One decoded page of a list endpoint.
#[derive(Debug, Clone)]
pub struct ListPage<T> {
    pub items: Vec<T>,
    /// Reported page count; `None` when the upstream omitted it.
    pub total_page: Option<i64>,
}

impl<T> Envelope<ListData<T>> {
    /// Flatten the envelope into its items and reported page count.
    ///
    /// `meta.total_page` wins over `data.pagination.total_page`. Non-positive
    /// counts are treated as absent.
    pub fn into_page(self) -> ListPage<T> {
        let meta_total = self.meta.as_ref().and_then(|m| m.total_page);
        let (items, pagination_total) = match self.data {
            None => (Vec::new(), None),
            Some(ListData::Flat(items)) => (items, None),
            Some(ListData::Nested { data, pagination }) => {
                (data, pagination.and_then(|p| p.total_page))
            }
        };
        ListPage {
            items,
            total_page: meta_total.or(pagination_total).filter(|t| *t > 0),
        }
    }
}

/// A taxonomy entry (genre, format, type, author or artist).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NamedEntry {
    #[serde(default)]
    pub slug: Option<String>,
    pub name: String,
}

/// Taxonomy associations carried by a manga snapshot.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExternalTaxonomy {
    #[serde(rename = "Artist", default)]
    pub artist: Vec<NamedEntry>,
    #[serde(rename = "Author", default)]
    pub author: Vec<NamedEntry>,
    #[serde(rename = "Format", default)]
    pub format: Vec<NamedEntry>,
    #[serde(rename = "Genre", default)]
    pub genre: Vec<NamedEntry>,
    #[serde(rename = "Type", default)]
    pub kind: Vec<NamedEntry>,
}

impl ExternalTaxonomy {
    pub fn entries(&self, kind: TaxonomyKind) -> &[NamedEntry] {
        match kind {
            TaxonomyKind::Genre => &self.genre,
            TaxonomyKind::Format => &self.format,
            TaxonomyKind::Type => &self.kind,
            TaxonomyKind::Author => &self.author,
            TaxonomyKind::Artist => &self.artist,
        }
    }

    /// Non-empty names for one kind, in upstream order.
    pub fn names(&self, kind: TaxonomyKind) -> Vec<String> {
        self.entries(kind)
            .iter()
            .map(|e| e.name.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect()
    }
}

/// A manga snapshot from the list or update endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalManga {
    #[serde(rename = "manga_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub alternative_title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "int_or_string")]
    pub status: Option<i64>,
    #[serde(default, alias = "country")]
    pub country_id: Option<String>,
    #[serde(default)]
    pub view_count: Option<i64>,
    #[serde(default)]
    pub vote_count: Option<i64>,
    #[serde(default)]
    pub bookmark_count: Option<i64>,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub rank: Option<f64>,
    #[serde(default, deserialize_with = "int_or_string")]
    pub release_year: Option<i64>,
    #[serde(default)]
    pub latest_chapter_number: Option<f64>,
    #[serde(default)]
    pub taxonomy: Option<ExternalTaxonomy>,
}

/// A chapter entry from a manga's chapter list.
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalChapter {
    #[serde(rename = "chapter_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub manga_id: Option<String>,
    #[serde(default)]
    pub chapter_number: f64,
    #[serde(default)]
    pub chapter_title: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub view_count: Option<i64>,
    #[serde(default)]
    pub thumbnail_image_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Page listing of one chapter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChapterPages {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub data: Vec<String>,
}

/// Chapter detail, carrying the ordered page filenames.
#[derive(Debug, Clone, Deserialize)]
pub struct ChapterDetail {
    #[serde(default)]
    pub chapter_id: Option<String>,
    #[serde(default)]
    pub manga_id: Option<String>,
    #[serde(default)]
    pub chapter_number: Option<f64>,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub base_url_low: String,
    #[serde(default)]
    pub chapter: ChapterPages,
}

/// Accept an integer, a float, a numeric string, or null.
///
/// Strings that do not parse become `None` instead of failing the page.
fn int_or_string<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Some(serde_json::Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    })
}
