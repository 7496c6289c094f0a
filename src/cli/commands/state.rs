//! Catalog status and checkpoint commands.

use console::style;

use crate::checkpoint::CheckpointStore;
use crate::config::Settings;
use crate::repository::{CatalogStore, SqliteCatalog};

/// Show catalog counts followed by the checkpoint report, if any.
pub fn cmd_status(settings: &Settings) -> anyhow::Result<()> {
    let catalog = SqliteCatalog::new(&settings.database, settings.store.clone())?;
    let stats = catalog.stats()?;

    println!("\n{}", style("Catalog").bold());
    println!("{}", "-".repeat(40));
    println!("  Comics:   {}", stats.comics);
    println!("  Chapters: {}", stats.chapters);
    println!("  Pages:    {}", stats.pages);
    println!(
        "  Taxonomy: {} genres, {} formats, {} types, {} authors, {} artists",
        stats.genres, stats.formats, stats.types, stats.authors, stats.artists
    );

    let checkpoints = CheckpointStore::new(&settings.checkpoint);
    match checkpoints.load()? {
        Some(checkpoint) => {
            println!();
            print!("{}", checkpoints.report(&checkpoint));
        }
        None => println!("\n{} No active crawl session", style("○").dim()),
    }

    Ok(())
}

/// Delete the checkpoint file. The `.backup` generation is kept.
pub fn cmd_clear_checkpoint(settings: &Settings) -> anyhow::Result<()> {
    let checkpoints = CheckpointStore::new(&settings.checkpoint);
    checkpoints.clear()?;
    println!(
        "{} Cleared checkpoint {}",
        style("✓").green(),
        checkpoints.path().display()
    );
    Ok(())
}
