//! Title similarity scoring.

use crate::models::ComicCandidate;
use crate::repository::{CatalogTx, Result};

use super::MATCH_FLOOR;

/// Maximum number of duplicate candidates considered per title.
pub const MAX_CANDIDATES: usize = 5;

/// An existing comic paired with an incoming title.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateMatch {
    pub id: String,
    pub title: String,
    pub external_id: Option<String>,
    pub score: f64,
}

/// Score how well `candidate` matches an incoming title and external id.
///
/// Rules apply in order: same external id 1.0, same title ignoring case 0.9,
/// one title containing the other 0.7, otherwise 0.0. Empty titles never
/// match by title.
pub fn similarity_score(title: &str, external_id: &str, candidate: &ComicCandidate) -> f64 {
    if !external_id.is_empty() && candidate.external_id.as_deref() == Some(external_id) {
        return 1.0;
    }

    let incoming = title.trim().to_lowercase();
    let existing = candidate.title.trim().to_lowercase();
    if incoming.is_empty() || existing.is_empty() {
        return 0.0;
    }

    if incoming == existing {
        0.9
    } else if incoming.contains(&existing) || existing.contains(&incoming) {
        0.7
    } else {
        0.0
    }
}

/// Up to [`MAX_CANDIDATES`] matches scoring above the floor, best first.
pub fn find_duplicates(
    tx: &dyn CatalogTx,
    title: &str,
    external_id: &str,
) -> Result<Vec<DuplicateMatch>> {
    let mut matches: Vec<DuplicateMatch> = tx
        .comic_candidates(title, external_id)?
        .into_iter()
        .map(|candidate| {
            let score = similarity_score(title, external_id, &candidate);
            DuplicateMatch {
                id: candidate.id,
                title: candidate.title,
                external_id: candidate.external_id,
                score,
            }
        })
        .filter(|m| m.score > MATCH_FLOOR)
        .collect();

    matches.sort_by(|a, b| b.score.total_cmp(&a.score));
    matches.truncate(MAX_CANDIDATES);
    Ok(matches)
}
