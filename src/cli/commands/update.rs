//! Auto-update command.

use console::style;

use crate::autoupdate::{AutoUpdater, StartOutcome, UpdateReport};
use crate::cli::helpers::build_crawler;
use crate::config::{AutoUpdateConfig, Settings};

/// Run the poller until ctrl-c, or a single check with `once`.
pub async fn cmd_auto_update(
    settings: &Settings,
    config: AutoUpdateConfig,
    once: bool,
) -> anyhow::Result<()> {
    let updater = AutoUpdater::new(build_crawler(settings)?, config);

    if once {
        let report = updater.check_now().await?;
        print_report(&report);
        return Ok(());
    }

    let config = updater.config();
    match updater.start() {
        StartOutcome::Started => println!(
            "{} Auto-update running every {}s over {} pages (ctrl-c to stop)",
            style("→").cyan(),
            config.interval_secs,
            config.max_pages
        ),
        StartOutcome::AlreadyRunning(_) => {
            println!("{} Auto-update already running", style("!").yellow())
        }
    }

    tokio::signal::ctrl_c().await?;
    println!("{} Stopping after the current check...", style("→").dim());
    updater.stop().await;

    if let Some(report) = updater.status().last_report {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &UpdateReport) {
    println!(
        "{} Update check: {} pages, {} new manga, {} chapter updates, {} page crawls",
        style("✓").green(),
        report.pages_checked,
        report.new_manga,
        report.chapter_recrawls,
        report.page_crawls
    );
    if report.errors > 0 {
        println!("  {} {} errors (see log)", style("!").yellow(), report.errors);
    }
}
