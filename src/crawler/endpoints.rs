//! URL construction for the external catalog endpoints.

use url::Url;

use super::CrawlError;
use crate::models::TaxonomyKind;

/// Page size used for chapter listings.
pub const CHAPTER_PAGE_SIZE: u32 = 24;

/// Builds endpoint URLs under a base URL.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: String,
}

impl Endpoints {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    fn build(&self, segments: &[&str], query: &[(&str, String)]) -> Result<String, CrawlError> {
        let mut url = Url::parse(&self.base).map_err(|e| {
            CrawlError::InvalidRequest(format!("invalid base URL {}: {}", self.base, e))
        })?;

        url.path_segments_mut()
            .map_err(|_| {
                CrawlError::InvalidRequest(format!("base URL cannot take a path: {}", self.base))
            })?
            .pop_if_empty()
            .extend(segments);

        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }

        Ok(url.into())
    }

    /// `{base}/{kind}/list?page=N`
    pub fn taxonomy_list(&self, kind: TaxonomyKind, page: i64) -> Result<String, CrawlError> {
        self.build(&[kind.endpoint(), "list"], &[("page", page.to_string())])
    }

    /// `{base}/{kind}/list?q=Q&page=N`
    pub fn taxonomy_search(
        &self,
        kind: TaxonomyKind,
        query: &str,
        page: i64,
    ) -> Result<String, CrawlError> {
        self.build(
            &[kind.endpoint(), "list"],
            &[("q", query.to_string()), ("page", page.to_string())],
        )
    }

    /// Recently updated manga, newest first.
    pub fn manga_list(&self, page: i64, page_size: u32) -> Result<String, CrawlError> {
        self.build(
            &["manga", "list"],
            &[
                ("type", String::new()),
                ("page", page.to_string()),
                ("page_size", page_size.to_string()),
                ("is_update", "true".to_string()),
                ("sort", "latest".to_string()),
                ("sort_order", "desc".to_string()),
            ],
        )
    }

    /// Chapters of one manga, highest chapter number first.
    pub fn chapter_list(&self, manga_id: &str, page: i64) -> Result<String, CrawlError> {
        self.build(
            &["chapter", manga_id, "list"],
            &[
                ("page", page.to_string()),
                ("page_size", CHAPTER_PAGE_SIZE.to_string()),
                ("sort_by", "chapter_number".to_string()),
                ("sort_order", "desc".to_string()),
            ],
        )
    }

    pub fn chapter_detail(&self, chapter_id: &str) -> Result<String, CrawlError> {
        self.build(&["chapter", "detail", chapter_id], &[])
    }
}
