//! CLI parser and command dispatch.

mod crawl;
mod init;
mod state;
mod update;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings, LoadOptions};

#[derive(Parser)]
#[command(name = "komiksync")]
#[command(about = "Manga catalog crawler and incremental synchronization engine")]
#[command(version)]
pub struct Cli {
    /// Config file path (defaults to ./komiksync.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Catalog database file (overrides config file)
    #[arg(long, global = true, env = "KOMIKSYNC_DATABASE")]
    database: Option<PathBuf>,

    /// Enable verbose logging, including every request URL
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Create the catalog database and schema
    Init,

    /// Run a crawl job
    Crawl {
        /// genres, formats, types, authors, artists, manga, chapters, pages, master or all
        mode: String,
        /// First manga list page
        #[arg(long, default_value = "1")]
        start_page: i64,
        /// Last manga list page (-1 = until the catalog runs out)
        #[arg(long, default_value = "10")]
        end_page: i64,
        /// Single manga external id for the chapters mode
        #[arg(long)]
        manga_id: Option<String>,
        /// Items between checkpoint saves
        #[arg(short, long, default_value = "10")]
        batch_size: usize,
        /// Report what would be saved without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Resume the crawl recorded in the checkpoint
    Resume,

    /// Show catalog counts and checkpoint progress
    Status,

    /// Delete the checkpoint so the next crawl starts fresh
    ClearCheckpoint,

    /// Poll for new manga and chapters
    AutoUpdate {
        /// Seconds between checks
        #[arg(long)]
        interval: Option<u64>,
        /// Feed pages to walk per check
        #[arg(long)]
        max_pages: Option<u32>,
        /// Feed page size
        #[arg(long)]
        page_size: Option<u32>,
        /// Crawl chapters of newly found manga
        #[arg(long)]
        crawl_chapters: Option<bool>,
        /// Crawl missing pages after chapter crawls
        #[arg(long)]
        crawl_pages: Option<bool>,
        /// Run a single check and exit
        #[arg(long)]
        once: bool,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        ignore_env: false,
    };
    let mut settings = load_settings(&options)?;
    if let Some(database) = cli.database {
        settings.database = database;
    }
    if cli.verbose {
        settings.crawler.verbose = true;
    }

    match cli.command {
        Commands::Init => init::cmd_init(&settings),
        Commands::Crawl {
            mode,
            start_page,
            end_page,
            manga_id,
            batch_size,
            dry_run,
        } => {
            let request = crawl::parse_request(
                &mode, start_page, end_page, manga_id, batch_size, dry_run,
            )?;
            crawl::cmd_crawl(&settings, request).await
        }
        Commands::Resume => crawl::cmd_resume(&settings).await,
        Commands::Status => state::cmd_status(&settings),
        Commands::ClearCheckpoint => state::cmd_clear_checkpoint(&settings),
        Commands::AutoUpdate {
            interval,
            max_pages,
            page_size,
            crawl_chapters,
            crawl_pages,
            once,
        } => {
            let mut config = settings.auto_update.clone();
            if let Some(interval) = interval {
                config.interval_secs = interval;
            }
            if let Some(max_pages) = max_pages {
                config.max_pages = max_pages;
            }
            if let Some(page_size) = page_size {
                config.page_size = page_size;
            }
            if let Some(crawl_chapters) = crawl_chapters {
                config.crawl_chapters = crawl_chapters;
            }
            if let Some(crawl_pages) = crawl_pages {
                config.crawl_pages = crawl_pages;
            }
            config.validate()?;
            update::cmd_auto_update(&settings, config, once).await
        }
    }
}
