//! Crawl and resume commands.

use anyhow::bail;
use console::style;

use crate::cli::helpers::{build_crawler, format_elapsed};
use crate::config::Settings;
use crate::jobs::{CrawlService, JobError, JobTracker, StartedJob};
use crate::models::{CrawlMode, CrawlRequest, JobStatus};
use crate::repository::SqliteCatalog;

/// Build a crawl request from command-line values.
pub fn parse_request(
    mode: &str,
    start_page: i64,
    end_page: i64,
    manga_id: Option<String>,
    batch_size: usize,
    dry_run: bool,
) -> anyhow::Result<CrawlRequest> {
    let Some(mode) = CrawlMode::from_str(mode) else {
        bail!(
            "unknown crawl mode '{}' (expected genres, formats, types, authors, artists, manga, chapters, pages, master or all)",
            mode
        );
    };

    Ok(CrawlRequest {
        mode,
        start_page,
        end_page,
        batch_size,
        manga_id,
        dry_run,
    })
}

/// Run a crawl job to completion.
pub async fn cmd_crawl(settings: &Settings, request: CrawlRequest) -> anyhow::Result<()> {
    let service = CrawlService::new(build_crawler(settings)?, JobTracker::new());

    println!(
        "{} Starting {} crawl{}",
        style("→").cyan(),
        request.mode,
        if request.dry_run { " (dry run)" } else { "" }
    );
    let job = service.start(request);
    wait_for(&service, job).await
}

/// Resume the checkpointed crawl.
pub async fn cmd_resume(settings: &Settings) -> anyhow::Result<()> {
    let service = CrawlService::new(build_crawler(settings)?, JobTracker::new());

    match service.resume() {
        Ok(job) => {
            println!("{} Resuming crawl from checkpoint", style("→").cyan());
            wait_for(&service, job).await
        }
        Err(JobError::NoCheckpoint) => {
            println!("{} No checkpoint to resume from", style("!").yellow());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn wait_for(service: &CrawlService<SqliteCatalog>, job: StartedJob) -> anyhow::Result<()> {
    job.task.await?;

    let record = service.status(&job.id)?;
    let elapsed = record
        .elapsed(service.crawler().clock().now())
        .num_seconds();

    match record.status {
        JobStatus::Completed => {
            println!(
                "{} Job {} completed in {}",
                style("✓").green(),
                record.id,
                format_elapsed(elapsed)
            );
            Ok(())
        }
        JobStatus::Failed => {
            let error = record.error.unwrap_or_default();
            println!(
                "{} Job {} failed after {}: {}",
                style("✗").red(),
                record.id,
                format_elapsed(elapsed),
                error
            );
            bail!("crawl failed: {}", error)
        }
        JobStatus::Running => {
            println!(
                "{} Job {} still running: {} ({:.0}%)",
                style("!").yellow(),
                record.id,
                record.progress.current_step,
                record.progress.percentage
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request() {
        let request = parse_request("auto", 1, 10, None, 10, false).unwrap();
        assert_eq!(request.mode, CrawlMode::Master);

        let request = parse_request("chapters", 1, 10, Some("m1".to_string()), 5, true).unwrap();
        assert_eq!(request.single_manga(), Some("m1"));
        assert!(request.dry_run);

        assert!(parse_request("everything", 1, 10, None, 10, false).is_err());
    }
}
