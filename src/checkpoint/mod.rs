//! Durable crawl checkpoints.
//!
//! One JSON file is authoritative; the previous generation is kept next to
//! it with a `.backup` suffix.

mod report;

pub use report::{format_duration, report_at, ProgressSummary};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::Checkpoint;

/// Checkpoint persistence errors.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed checkpoint: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("checkpoint would move backwards ({stored} already processed, got {incoming})")]
    Regressed { stored: u64, incoming: u64 },
}

pub type Result<T> = std::result::Result<T, CheckpointError>;

/// File-backed checkpoint store.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".backup");
        PathBuf::from(name)
    }

    /// Persist `checkpoint`, stamping `last_update` with the current time.
    ///
    /// Within one run (same `start_time`) `total_processed` may not decrease.
    /// Returns the checkpoint as written.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<Checkpoint> {
        let mut checkpoint = checkpoint.clone();
        checkpoint.last_update = Utc::now();

        if let Some(stored) = self.load_quiet()? {
            if stored.start_time == checkpoint.start_time
                && checkpoint.total_processed < stored.total_processed
            {
                return Err(CheckpointError::Regressed {
                    stored: stored.total_processed,
                    incoming: checkpoint.total_processed,
                });
            }
        }

        let data = serde_json::to_string_pretty(&checkpoint)?;

        // The authoritative file is only ever replaced by a rename, never
        // written in place.
        let tmp_path = self
            .path
            .with_extension(format!("tmp.{}", Uuid::new_v4().simple()));
        fs::write(&tmp_path, data).map_err(|source| CheckpointError::Io {
            path: tmp_path.clone(),
            source,
        })?;

        if self.path.exists() {
            if let Err(e) = fs::rename(&self.path, self.backup_path()) {
                warn!("Failed to back up checkpoint {}: {}", self.path.display(), e);
            }
        }

        if let Err(source) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(CheckpointError::Io {
                path: self.path.clone(),
                source,
            });
        }

        info!(
            "Checkpoint saved: {} page {} processed {}/{}",
            checkpoint.phase.as_str(),
            checkpoint.current_page,
            checkpoint.total_processed,
            checkpoint.estimated_total
        );
        Ok(checkpoint)
    }

    /// Load the current checkpoint; `None` when no file exists.
    pub fn load(&self) -> Result<Option<Checkpoint>> {
        let checkpoint = self.load_quiet()?;
        if let Some(c) = &checkpoint {
            info!(
                "Checkpoint loaded: {} page {} processed {}/{}",
                c.phase.as_str(),
                c.current_page,
                c.total_processed,
                c.estimated_total
            );
        }
        Ok(checkpoint)
    }

    /// Read the authoritative file, falling back to the backup generation
    /// when the authoritative one is malformed.
    fn load_quiet(&self) -> Result<Option<Checkpoint>> {
        let Some(data) = read_optional(&self.path)? else {
            return Ok(None);
        };
        match serde_json::from_str(&data) {
            Ok(checkpoint) => Ok(Some(checkpoint)),
            Err(e) => {
                let backup = self.backup_path();
                let recovered = read_optional(&backup)?
                    .and_then(|data| serde_json::from_str::<Checkpoint>(&data).ok());
                match recovered {
                    Some(checkpoint) => {
                        warn!(
                            "Checkpoint {} is malformed ({}), using {}",
                            self.path.display(),
                            e,
                            backup.display()
                        );
                        Ok(Some(checkpoint))
                    }
                    None => Err(e.into()),
                }
            }
        }
    }

    /// Remove the checkpoint file. Absent files are not an error.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Checkpoint cleared");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No checkpoint to clear at {}", self.path.display());
                Ok(())
            }
            Err(source) => Err(CheckpointError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Human-readable progress report for `checkpoint` as of now.
    pub fn report(&self, checkpoint: &Checkpoint) -> String {
        report_at(checkpoint, Utc::now())
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(CheckpointError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Phase;
    use chrono::Duration;

    fn store() -> (tempfile::TempDir, CheckpointStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("crawler_checkpoint.json"));
        (dir, store)
    }

    #[test]
    fn test_absent_checkpoint_is_none() {
        let (_dir, store) = store();
        assert!(store.load().unwrap().is_none());
        assert!(store.clear().is_ok());
    }

    #[test]
    fn test_round_trip() {
        let (_dir, store) = store();
        let mut checkpoint = Checkpoint::new(Phase::Chapters, Utc::now() - Duration::minutes(5));
        checkpoint.current_page = 4;
        checkpoint.total_processed = 40;
        checkpoint.last_manga_id = "ext-40".to_string();
        checkpoint.estimated_total = 400;
        checkpoint.success_count = 38;
        checkpoint.error_count = 2;

        let saved = store.save(&checkpoint).unwrap();
        assert!(saved.last_update >= checkpoint.last_update);
        assert_eq!(store.load().unwrap(), Some(saved));
    }

    #[test]
    fn test_second_save_keeps_one_backup() {
        let (_dir, store) = store();
        let mut checkpoint = Checkpoint::new(Phase::Manga, Utc::now());
        checkpoint.total_processed = 1;
        let first = store.save(&checkpoint).unwrap();

        checkpoint.total_processed = 2;
        store.save(&checkpoint).unwrap();

        let backup: Checkpoint =
            serde_json::from_str(&fs::read_to_string(store.backup_path()).unwrap()).unwrap();
        assert_eq!(backup, first);
        assert_eq!(store.load().unwrap().unwrap().total_processed, 2);
    }

    #[test]
    fn test_regression_within_run_rejected() {
        let (_dir, store) = store();
        let mut checkpoint = Checkpoint::new(Phase::Pages, Utc::now());
        checkpoint.total_processed = 10;
        store.save(&checkpoint).unwrap();

        checkpoint.total_processed = 5;
        assert!(matches!(
            store.save(&checkpoint),
            Err(CheckpointError::Regressed { stored: 10, incoming: 5 })
        ));

        // A new run may start from zero.
        let fresh = Checkpoint::new(Phase::Pages, Utc::now() + Duration::seconds(1));
        assert!(store.save(&fresh).is_ok());
    }

    #[test]
    fn test_clear_removes_file() {
        let (_dir, store) = store();
        store
            .save(&Checkpoint::new(Phase::Manga, Utc::now()))
            .unwrap();
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let (_dir, store) = store();
        fs::write(store.path(), "{not json").unwrap();
        assert!(matches!(store.load(), Err(CheckpointError::Serialize(_))));
    }

    #[test]
    fn test_save_leaves_no_temp_files() {
        let (dir, store) = store();
        let mut checkpoint = Checkpoint::new(Phase::Manga, Utc::now());
        store.save(&checkpoint).unwrap();
        checkpoint.total_processed = 3;
        store.save(&checkpoint).unwrap();

        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec!["crawler_checkpoint.json", "crawler_checkpoint.json.backup"]
        );
    }

    #[test]
    fn test_truncated_file_falls_back_to_backup() {
        let (_dir, store) = store();
        let mut checkpoint = Checkpoint::new(Phase::Chapters, Utc::now());
        checkpoint.total_processed = 20;
        checkpoint.last_manga_id = "ext-20".to_string();
        let first = store.save(&checkpoint).unwrap();
        checkpoint.total_processed = 30;
        store.save(&checkpoint).unwrap();

        let full = fs::read_to_string(store.path()).unwrap();
        fs::write(store.path(), &full[..full.len() / 2]).unwrap();

        assert_eq!(store.load().unwrap(), Some(first));
    }
}
