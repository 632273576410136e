//! Session recording and durable storage.
//!
//! The recorder keeps every [`Exchange`] of the current run in memory. When
//! the run ends it is flushed exactly once through a [`SessionStore`], which
//! writes the whole run as a single [`SessionLog`] artifact.

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use parley_core::{BridgeError, Exchange, SessionInfo, SessionLog};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Durable destination for finished session logs.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist one log as a new artifact and return where it was written.
    async fn save(&self, log: &SessionLog) -> Result<String, BridgeError>;
}

/// Writes each session log as a pretty-printed JSON file under a directory.
///
/// File names follow `session_YYYYmmdd_HHMMSS_mmm.json` (local time of the
/// flush). Existing files are never overwritten.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(stamp: DateTime<Local>, attempt: u32) -> String {
        let base = stamp.format("session_%Y%m%d_%H%M%S_%3f");
        if attempt == 0 {
            format!("{base}.json")
        } else {
            format!("{base}_{attempt}.json")
        }
    }
}

#[async_trait]
impl SessionStore for JsonFileStore {
    async fn save(&self, log: &SessionLog) -> Result<String, BridgeError> {
        let body = serde_json::to_vec_pretty(log)
            .map_err(|e| BridgeError::Persistence(format!("cannot encode session log: {e}")))?;

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            BridgeError::Persistence(format!("cannot create {}: {e}", self.dir.display()))
        })?;

        let stamp = Local::now();
        let mut attempt = 0;
        let (path, mut file) = loop {
            let path = self.dir.join(Self::file_name(stamp, attempt));
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => break (path, file),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && attempt < 100 => {
                    attempt += 1;
                }
                Err(e) => {
                    return Err(BridgeError::Persistence(format!(
                        "cannot create {}: {e}",
                        path.display()
                    )));
                }
            }
        };

        file.write_all(&body).await.map_err(|e| {
            BridgeError::Persistence(format!("cannot write {}: {e}", path.display()))
        })?;
        file.flush().await.map_err(|e| {
            BridgeError::Persistence(format!("cannot write {}: {e}", path.display()))
        })?;

        Ok(path.display().to_string())
    }
}

/// In-memory exchange log for one run.
pub struct SessionRecorder {
    started_at: Option<DateTime<Utc>>,
    exchanges: Mutex<Vec<Exchange>>,
    store: Arc<dyn SessionStore>,
}

impl SessionRecorder {
    pub fn new(started_at: Option<DateTime<Utc>>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            started_at,
            exchanges: Mutex::new(Vec::new()),
            store,
        }
    }

    pub fn append(&self, exchange: Exchange) {
        self.exchanges.lock().unwrap().push(exchange);
    }

    /// The most recent `limit` exchanges, oldest first, plus the total count.
    pub fn snapshot(&self, limit: usize) -> (usize, Vec<Exchange>) {
        let exchanges = self.exchanges.lock().unwrap();
        let skip = exchanges.len().saturating_sub(limit);
        (exchanges.len(), exchanges[skip..].to_vec())
    }

    /// Assemble the durable form of everything recorded so far.
    pub fn session_log(&self) -> SessionLog {
        let exchanges = self.exchanges.lock().unwrap().clone();
        SessionLog {
            session_info: SessionInfo {
                started_at: self.started_at,
                exchanges_completed: exchanges.len() as u64,
            },
            exchanges,
        }
    }

    /// Write the run to the durable store.
    ///
    /// Returns `Ok(None)` without touching the store when nothing was
    /// recorded.
    pub async fn flush(&self) -> Result<Option<String>, BridgeError> {
        let log = self.session_log();
        if log.exchanges.is_empty() {
            debug!("No exchanges recorded, nothing to flush");
            return Ok(None);
        }

        let location = self.store.save(&log).await?;
        info!(
            exchanges = log.exchanges.len(),
            location = %location,
            "Session log saved"
        );
        Ok(Some(location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::Metrics;

    fn exchange(n: usize) -> Exchange {
        Exchange::now(format!("out {n}"), format!("reply {n}"), Metrics::new())
    }

    #[test]
    fn snapshot_returns_most_recent() {
        let store = Arc::new(JsonFileStore::new("unused"));
        let recorder = SessionRecorder::new(None, store);
        for n in 1..=5 {
            recorder.append(exchange(n));
        }

        let (total, recent) = recorder.snapshot(2);
        assert_eq!(total, 5);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].outbound_to_subject, "out 4");
        assert_eq!(recent[1].outbound_to_subject, "out 5");

        let (_, all) = recorder.snapshot(100);
        assert_eq!(all.len(), 5);
    }

    #[tokio::test]
    async fn flush_writes_one_pretty_json_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::new(dir.path().join("logs")));
        let recorder = SessionRecorder::new(Some(Utc::now()), store);
        recorder.append(exchange(1));
        recorder.append(exchange(2));

        let location = recorder.flush().await.unwrap().unwrap();
        let path = PathBuf::from(&location);
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("session_"));
        assert!(name.ends_with(".json"));

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\n  \"sessionInfo\""));
        let log: SessionLog = serde_json::from_str(&raw).unwrap();
        assert_eq!(log.session_info.exchanges_completed, 2);
        assert_eq!(log.exchanges.len(), 2);
        assert_eq!(log.exchanges[1].subject_reply, "reply 2");
    }

    #[tokio::test]
    async fn empty_flush_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::new(dir.path()));
        let recorder = SessionRecorder::new(None, store);

        assert!(recorder.flush().await.unwrap().is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn consecutive_saves_never_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let log = SessionLog {
            session_info: SessionInfo {
                started_at: None,
                exchanges_completed: 1,
            },
            exchanges: vec![exchange(1)],
        };

        let first = store.save(&log).await.unwrap();
        let second = store.save(&log).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn unwritable_directory_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, "file").unwrap();

        let store = Arc::new(JsonFileStore::new(&blocker));
        let recorder = SessionRecorder::new(None, store);
        recorder.append(exchange(1));

        let err = recorder.flush().await.unwrap_err();
        assert_eq!(err.code(), "persistence_failed");
    }
}
