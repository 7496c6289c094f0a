//! Initialize command.

use console::style;

use crate::config::Settings;
use crate::repository::{CatalogStore, SqliteCatalog};

/// Create the catalog database and its schema.
pub fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    if let Some(parent) = settings.database.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let catalog = SqliteCatalog::new(&settings.database, settings.store.clone())?;
    let stats = catalog.stats()?;

    println!(
        "{} Initialized catalog at {} ({} comics)",
        style("✓").green(),
        catalog.database_path().display(),
        stats.comics
    );
    Ok(())
}
