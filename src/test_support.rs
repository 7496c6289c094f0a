//! Shared fixtures for unit tests: a scripted fetcher, an instant clock and
//! a crawler wired to a temporary catalog.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::checkpoint::CheckpointStore;
use crate::clock::Clock;
use crate::config::{CrawlerConfig, StoreConfig};
use crate::crawler::Crawler;
use crate::fetch::{FetchError, Fetcher};
use crate::models::{ExternalChapter, ExternalManga};
use crate::repository::{CatalogStore, SqliteCatalog};
use crate::upsert::{save_chapters, save_manga};

pub const TEST_BASE_URL: &str = "https://api.example.com/v1";

enum Scripted {
    Body(Value),
    Status(u16),
}

/// Fetcher answering from per-URL scripts.
///
/// Each URL replays its queued responses in order and then keeps repeating
/// the last one. Unscripted URLs answer with an empty list.
#[derive(Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    log: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn respond(&self, url: &str, body: Value) {
        self.push(url, Scripted::Body(body));
    }

    pub fn fail(&self, url: &str, status: u16) {
        self.push(url, Scripted::Status(status));
    }

    fn push(&self, url: &str, response: Scripted) {
        self.scripts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
    }

    /// Every requested URL, in order.
    pub fn requests(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|url| url.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        url: &str,
        _headers: &BTreeMap<String, String>,
    ) -> Result<Vec<u8>, FetchError> {
        self.log.lock().unwrap().push(url.to_string());

        let mut scripts = self.scripts.lock().unwrap();
        let response = match scripts.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().map(|r| match r {
                Scripted::Body(v) => Scripted::Body(v.clone()),
                Scripted::Status(s) => Scripted::Status(*s),
            }),
            None => None,
        };

        match response {
            Some(Scripted::Status(status)) => Err(FetchError::Status {
                url: url.to_string(),
                status,
            }),
            Some(Scripted::Body(body)) => Ok(body.to_string().into_bytes()),
            None => Ok(empty_list().to_string().into_bytes()),
        }
    }
}

/// Clock whose sleeps return after one yield and advance `now`.
pub struct InstantClock {
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<Duration>>,
}

impl Default for InstantClock {
    fn default() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()),
            sleeps: Mutex::new(Vec::new()),
        }
    }
}

impl InstantClock {
    pub fn slept_millis(&self) -> Vec<u64> {
        self.sleeps
            .lock()
            .unwrap()
            .iter()
            .map(|d| d.as_millis() as u64)
            .collect()
    }
}

#[async_trait]
impl Clock for InstantClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        *self.now.lock().unwrap() += chrono::Duration::from_std(duration).unwrap();
        // Keep loops driven by this clock from starving other tasks.
        tokio::task::yield_now().await;
    }
}

/// A crawler over a fresh temporary catalog.
pub struct TestHarness {
    _dir: TempDir,
    pub store: Arc<SqliteCatalog>,
    pub fetcher: Arc<ScriptedFetcher>,
    pub clock: Arc<InstantClock>,
    pub crawler: Crawler<SqliteCatalog>,
}

impl TestHarness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            SqliteCatalog::new(&dir.path().join("catalog.db"), StoreConfig::default()).unwrap(),
        );
        let fetcher = Arc::new(ScriptedFetcher::default());
        let clock = Arc::new(InstantClock::default());
        let config = CrawlerConfig {
            base_url: TEST_BASE_URL.to_string(),
            ..CrawlerConfig::default()
        };
        let crawler = Crawler::new(store.clone(), fetcher.clone(), clock.clone(), config);
        Self {
            _dir: dir,
            store,
            fetcher,
            clock,
            crawler,
        }
    }

    pub fn checkpoint_store(&self) -> (TempDir, Arc<CheckpointStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(CheckpointStore::new(dir.path().join("checkpoint.json")));
        (dir, store)
    }

    pub fn seed_manga(&self, manga: &[(&str, &str)]) {
        for (id, title) in manga {
            let manga: ExternalManga = serde_json::from_value(manga_json(id, title, None)).unwrap();
            self.store
                .transaction(|tx| save_manga(tx, &manga))
                .unwrap();
        }
    }

    pub fn seed_chapters(&self, manga_id: &str, chapters: &[(&str, f64)]) {
        let chapters: Vec<ExternalChapter> = chapters
            .iter()
            .map(|(id, number)| serde_json::from_value(chapter_json(id, manga_id, *number)).unwrap())
            .collect();
        self.store
            .transaction(|tx| save_chapters(tx, manga_id, &chapters))
            .unwrap();
    }
}

pub fn empty_list() -> Value {
    json!({"retcode": 0, "message": "success", "data": []})
}

pub fn list_of_names(names: &[&str]) -> Value {
    let data: Vec<Value> = names
        .iter()
        .map(|name| json!({"slug": name.to_lowercase(), "name": name}))
        .collect();
    json!({"retcode": 0, "data": data})
}

pub fn manga_json(id: &str, title: &str, latest_chapter: Option<f64>) -> Value {
    json!({
        "manga_id": id,
        "title": title,
        "description": format!("About {}", title),
        "status": 1,
        "country_id": "KR",
        "view_count": 100,
        "cover_image_url": format!("https://cdn.example.com/cover/{}.jpg", id),
        "latest_chapter_number": latest_chapter,
        "taxonomy": {"Genre": [{"slug": "action", "name": "Action"}]}
    })
}

pub fn chapter_json(id: &str, manga_id: &str, number: f64) -> Value {
    json!({
        "chapter_id": id,
        "manga_id": manga_id,
        "chapter_number": number,
        "chapter_title": format!("Chapter {}", number),
        "view_count": 5
    })
}

pub fn detail_json(chapter_id: &str, files: &[&str]) -> Value {
    json!({
        "retcode": 0,
        "data": {
            "chapter_id": chapter_id,
            "base_url": "https://cdn.example.com",
            "base_url_low": "https://low.example.com",
            "chapter": {"path": format!("/chapter/{}/", chapter_id), "data": files}
        }
    })
}
