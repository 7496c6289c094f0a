//! Auto-update poller.
//!
//! A background task that runs an update check immediately on start and
//! then once per interval, waiting on the crawler's [`Clock`], until
//! stopped. The poller is an explicit two-state machine:
//! [`PollerState::Stopped`] or [`PollerState::Running`] holding the stop
//! channel and the task handle. Stopping never cancels a check in flight;
//! the signal is observed while waiting for the next round.
//!
//! [`Clock`]: crate::clock::Clock

mod check;

pub use check::UpdateReport;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{AutoUpdateConfig, ConfigError};
use crate::crawler::{CrawlError, Crawler};
use crate::repository::CatalogStore;

/// Lifecycle of the background task.
enum PollerState {
    Stopped,
    Running {
        stop_tx: oneshot::Sender<()>,
        handle: JoinHandle<()>,
    },
}

/// Result of [`AutoUpdater::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// The poller was already running; nothing changed.
    AlreadyRunning(AutoUpdateConfig),
}

/// Snapshot of the poller for status queries.
#[derive(Debug, Clone, Serialize)]
pub struct AutoUpdateStatus {
    pub running: bool,
    pub config: AutoUpdateConfig,
    pub last_check: Option<DateTime<Utc>>,
    pub last_report: Option<UpdateReport>,
}

struct Shared<S: CatalogStore> {
    crawler: Crawler<S>,
    config: Mutex<AutoUpdateConfig>,
    last: Mutex<Option<(DateTime<Utc>, UpdateReport)>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<S: CatalogStore> Shared<S> {
    fn config(&self) -> AutoUpdateConfig {
        lock(&self.config).clone()
    }

    /// Run one check and record its report; failures are only logged.
    async fn run_check(&self) {
        let config = self.config();
        let started = self.crawler.clock().now();
        info!("Checking for updates ({})", started.format("%H:%M:%S"));

        match check::check_for_updates(&self.crawler, &config).await {
            Ok(report) => {
                let elapsed = self.crawler.clock().now() - started;
                info!(
                    "Update check completed in {}s (new manga: {}, chapter updates: {}, errors: {})",
                    elapsed.num_seconds(),
                    report.new_manga,
                    report.chapter_recrawls,
                    report.errors
                );
                *lock(&self.last) = Some((started, report));
            }
            Err(e) => error!("Update check failed: {}", e),
        }
    }
}

/// Polls the external catalog for new manga and chapters.
pub struct AutoUpdater<S: CatalogStore> {
    shared: Arc<Shared<S>>,
    state: Mutex<PollerState>,
}

impl<S: CatalogStore> AutoUpdater<S> {
    pub fn new(crawler: Crawler<S>, config: AutoUpdateConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                crawler,
                config: Mutex::new(config),
                last: Mutex::new(None),
            }),
            state: Mutex::new(PollerState::Stopped),
        }
    }

    /// Start the background task. Starting a running poller is a no-op.
    pub fn start(&self) -> StartOutcome {
        let mut state = lock(&self.state);
        if let PollerState::Running { handle, .. } = &*state {
            if !handle.is_finished() {
                return StartOutcome::AlreadyRunning(self.shared.config());
            }
            warn!("Auto-update task exited unexpectedly, restarting");
        }

        let config = self.shared.config();
        info!(
            "Auto-update starting (interval: {}s, max pages: {}, crawl chapters: {}, crawl pages: {})",
            config.interval_secs, config.max_pages, config.crawl_chapters, config.crawl_pages
        );

        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(run_loop(Arc::clone(&self.shared), stop_rx));
        *state = PollerState::Running { stop_tx, handle };
        StartOutcome::Started
    }

    /// Signal the task and wait for it to exit. Stopping a stopped poller
    /// is a no-op.
    pub async fn stop(&self) {
        let previous = std::mem::replace(&mut *lock(&self.state), PollerState::Stopped);
        let PollerState::Running { stop_tx, handle } = previous else {
            return;
        };

        info!("Stopping auto-update");
        // The receiver is gone only when the task already exited.
        let _ = stop_tx.send(());
        if let Err(e) = handle.await {
            warn!("Auto-update task ended abnormally: {}", e);
        }
    }

    pub fn is_running(&self) -> bool {
        match &*lock(&self.state) {
            PollerState::Stopped => false,
            PollerState::Running { handle, .. } => !handle.is_finished(),
        }
    }

    pub fn config(&self) -> AutoUpdateConfig {
        self.shared.config()
    }

    /// Replace the configuration after validating it.
    ///
    /// A running poller picks the new values up at its next tick.
    pub fn update_config(&self, config: AutoUpdateConfig) -> Result<(), ConfigError> {
        config.validate()?;
        *lock(&self.shared.config) = config;
        info!("Auto-update config updated");
        Ok(())
    }

    pub fn status(&self) -> AutoUpdateStatus {
        let last = lock(&self.shared.last).clone();
        AutoUpdateStatus {
            running: self.is_running(),
            config: self.shared.config(),
            last_check: last.as_ref().map(|(at, _)| *at),
            last_report: last.map(|(_, report)| report),
        }
    }

    /// Run one update check on the caller's task, outside the tick loop.
    pub async fn check_now(&self) -> Result<UpdateReport, CrawlError> {
        let config = self.shared.config();
        let report = check::check_for_updates(&self.shared.crawler, &config).await?;
        *lock(&self.shared.last) = Some((self.shared.crawler.clock().now(), report.clone()));
        Ok(report)
    }
}

async fn run_loop<S: CatalogStore>(shared: Arc<Shared<S>>, mut stop_rx: oneshot::Receiver<()>) {
    info!("Auto-update started");
    shared.run_check().await;

    let clock = Arc::clone(shared.crawler.clock());
    loop {
        // Re-read each round so interval changes apply from the next wait.
        let period = shared.config().interval();
        tokio::select! {
            _ = clock.sleep(period) => {
                if shared.config().enabled {
                    shared.run_check().await;
                } else {
                    debug!("Auto-update disabled, skipping check");
                }
            }
            _ = &mut stop_rx => break,
        }
    }

    info!("Auto-update stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{manga_json, TestHarness};
    use serde_json::json;

    fn updater(h: &TestHarness) -> AutoUpdater<crate::repository::SqliteCatalog> {
        AutoUpdater::new(h.crawler.clone(), AutoUpdateConfig::default())
    }

    #[tokio::test]
    async fn test_start_stop_transitions() {
        let h = TestHarness::new();
        let poller = updater(&h);
        assert!(!poller.is_running());

        // Stop before start does nothing.
        poller.stop().await;

        assert_eq!(poller.start(), StartOutcome::Started);
        assert!(poller.is_running());
        assert_eq!(
            poller.start(),
            StartOutcome::AlreadyRunning(AutoUpdateConfig::default())
        );

        poller.stop().await;
        assert!(!poller.is_running());

        // The immediate check ran before the stop was observed.
        let status = poller.status();
        assert!(!status.running);
        assert!(status.last_check.is_some());
        assert_eq!(status.last_report.map(|r| r.pages_checked), Some(1));
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let h = TestHarness::new();
        let poller = updater(&h);
        assert_eq!(poller.start(), StartOutcome::Started);
        poller.stop().await;
        assert_eq!(poller.start(), StartOutcome::Started);
        poller.stop().await;
        assert!(!poller.is_running());
    }

    fn feed_fetches(h: &TestHarness) -> usize {
        let feed = h.crawler.endpoints().manga_list(1, 24).unwrap();
        h.fetcher.requests().iter().filter(|url| **url == feed).count()
    }

    async fn wait_until(mut done: impl FnMut() -> bool) {
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while !done() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_poller_waits_one_interval_between_checks() {
        let h = TestHarness::new();
        let poller = updater(&h);

        poller.start();
        wait_until(|| feed_fetches(&h) >= 3).await;

        let slower = AutoUpdateConfig {
            interval_secs: 600,
            ..AutoUpdateConfig::default()
        };
        poller.update_config(slower).unwrap();
        wait_until(|| h.clock.slept_millis().contains(&600_000)).await;
        poller.stop().await;

        let waits = h.clock.slept_millis();
        let switch = waits.iter().position(|ms| *ms == 600_000).unwrap();
        assert!(switch >= 2);
        assert!(waits[..switch].iter().all(|ms| *ms == 300_000));
        assert!(waits[switch..].iter().all(|ms| *ms == 600_000));

        let after_stop = feed_fetches(&h);
        tokio::task::yield_now().await;
        assert_eq!(feed_fetches(&h), after_stop);
        assert!(!poller.is_running());
    }

    #[tokio::test]
    async fn test_disabled_poller_keeps_waiting_without_checking() {
        let h = TestHarness::new();
        let poller = AutoUpdater::new(
            h.crawler.clone(),
            AutoUpdateConfig {
                enabled: false,
                ..AutoUpdateConfig::default()
            },
        );

        poller.start();
        wait_until(|| h.clock.slept_millis().len() >= 3).await;
        poller.stop().await;

        // Only the check on start ran.
        assert_eq!(feed_fetches(&h), 1);
    }

    #[test]
    fn test_update_config_validates() {
        let h = TestHarness::new();
        let poller = updater(&h);

        let bad = AutoUpdateConfig {
            interval_secs: 10,
            ..AutoUpdateConfig::default()
        };
        assert!(poller.update_config(bad).is_err());
        assert_eq!(poller.config(), AutoUpdateConfig::default());

        let good = AutoUpdateConfig {
            interval_secs: 600,
            max_pages: 2,
            ..AutoUpdateConfig::default()
        };
        poller.update_config(good.clone()).unwrap();
        assert_eq!(poller.config(), good);
    }

    #[tokio::test]
    async fn test_check_now_records_report() {
        let h = TestHarness::new();
        let poller = updater(&h);
        let url = h.crawler.endpoints().manga_list(1, 24).unwrap();
        h.fetcher.respond(
            &url,
            json!({"data": {"data": [manga_json("m1", "Solo Hunter", Some(1.0))], "pagination": {"total_page": 1}}}),
        );

        let report = poller.check_now().await.unwrap();
        assert_eq!(report.new_manga, 1);
        assert_eq!(poller.status().last_report, Some(report));
    }
}
