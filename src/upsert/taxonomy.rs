//! Taxonomy upsert keyed by name.

use crate::models::TaxonomyKind;
use crate::repository::{CatalogTx, Result};

/// Upsert every non-empty name; returns how many were written.
pub fn save_taxonomy(tx: &dyn CatalogTx, kind: TaxonomyKind, names: &[String]) -> Result<usize> {
    let mut saved = 0;
    for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
        tx.upsert_taxonomy(kind, name)?;
        saved += 1;
    }
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::repository::{CatalogStore, SqliteCatalog};

    #[test]
    fn test_save_taxonomy_skips_blank_and_dedups() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = SqliteCatalog::new(&dir.path().join("catalog.db"), StoreConfig::default())
            .unwrap();
        let names = vec![
            "Action".to_string(),
            " ".to_string(),
            "Drama".to_string(),
            "Action".to_string(),
        ];
        let saved = catalog
            .transaction(|tx| save_taxonomy(tx, TaxonomyKind::Format, &names))
            .unwrap();
        assert_eq!(saved, 3);
        assert_eq!(
            catalog.taxonomy_names(TaxonomyKind::Format).unwrap(),
            vec!["Action", "Drama"]
        );
    }
}
