//! Shared storage medium between execution contexts.
//!
//! Values are complete JSON documents stored under string keys. Watchers are
//! told about every value written by *another* handle; a writer never sees
//! its own writes.

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use lounge_shared::time::get_utc_timestamp;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::StorageError;

/// Default polling interval of [`FileStorage`].
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Stream of values written to a watched key by other handles.
pub type StorageWatch = mpsc::UnboundedReceiver<String>;

/// Key-value medium with change notifications that exclude the writer
#[async_trait]
pub trait SharedStorage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Watch `key`. Dropping the receiver ends the watch.
    fn watch(&self, key: &str) -> StorageWatch;
}

// ========================================
// In-process medium
// ========================================

struct Watcher {
    owner: u64,
    key: String,
    sender: mpsc::UnboundedSender<String>,
}

#[derive(Default)]
struct MediumState {
    values: HashMap<String, String>,
    watchers: Vec<Watcher>,
}

/// In-process medium; each context takes its own [`MemoryStorage`] handle
#[derive(Clone, Default)]
pub struct MemoryStorageMedium {
    state: Arc<Mutex<MediumState>>,
    next_owner: Arc<AtomicU64>,
}

impl MemoryStorageMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// New handle with its own writer identity
    pub fn handle(&self) -> MemoryStorage {
        MemoryStorage {
            medium: self.clone(),
            owner: self.next_owner.fetch_add(1, Ordering::Relaxed),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MediumState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// One context's view of a [`MemoryStorageMedium`]
#[derive(Clone)]
pub struct MemoryStorage {
    medium: MemoryStorageMedium,
    owner: u64,
}

#[async_trait]
impl SharedStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.medium.lock().values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut state = self.medium.lock();
        state.values.insert(key.to_string(), value.to_string());
        state.watchers.retain(|watcher| {
            if watcher.key != key || watcher.owner == self.owner {
                return !watcher.sender.is_closed();
            }
            watcher.sender.send(value.to_string()).is_ok()
        });
        Ok(())
    }

    fn watch(&self, key: &str) -> StorageWatch {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.medium.lock().watchers.push(Watcher {
            owner: self.owner,
            key: key.to_string(),
            sender,
        });
        receiver
    }
}

// ========================================
// File-backed medium
// ========================================

/// How long change records stay in a key's log
pub const CHANGE_RETENTION: Duration = Duration::from_secs(30);

/// Directory of JSON files shared by processes on one machine.
///
/// `{key}.json` holds the current value. Every write also lands as its own
/// record in `{key}.log/`, named `{millis}-{seq}-{writer}.json`, so watchers
/// see each write even when several happen between two polls. Files are
/// written under a temporary name and renamed, so readers only ever see
/// complete documents. Records older than [`CHANGE_RETENTION`] are pruned by
/// the writers.
#[derive(Clone)]
pub struct FileStorage {
    dir: PathBuf,
    poll_interval: Duration,
    /// Identifies this handle's records so its own watchers skip them
    writer: String,
    next_seq: Arc<AtomicU64>,
}

impl FileStorage {
    /// Open (and create if needed) a storage directory
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            poll_interval: DEFAULT_POLL_INTERVAL,
            writer: Uuid::new_v4().simple().to_string(),
            next_seq: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn log_dir_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.log", key))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!(".{}.{}.tmp", key, Uuid::new_v4().simple()))
    }

    /// Write `value` to `target` through a temporary file
    async fn write_atomically(
        &self,
        key: &str,
        target: &Path,
        value: &str,
    ) -> Result<(), StorageError> {
        let temp = self.temp_path(key);
        tokio::fs::write(&temp, value).await?;
        if let Err(e) = tokio::fs::rename(&temp, target).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Remove records of `log_dir` older than the retention window
    async fn prune(&self, log_dir: &Path, now_millis: i64) {
        let horizon = now_millis - CHANGE_RETENTION.as_millis() as i64;
        let names = match list_records(log_dir).await {
            Ok(names) => names,
            Err(e) => {
                tracing::debug!("Failed to list '{}': {}", log_dir.display(), e);
                return;
            }
        };
        for name in names {
            if record_millis(&name).is_some_and(|millis| millis < horizon) {
                // Another writer may have removed it already
                let _ = tokio::fs::remove_file(log_dir.join(&name)).await;
            }
        }
    }
}

fn record_name(millis: i64, seq: u64, writer: &str) -> String {
    format!("{:013}-{:08}-{}.json", millis, seq, writer)
}

fn record_millis(name: &str) -> Option<i64> {
    name.split('-').next()?.parse().ok()
}

fn record_writer(name: &str) -> Option<&str> {
    name.strip_suffix(".json")?.rsplit('-').next()
}

async fn read_optional(path: &Path) -> Result<Option<String>, StorageError> {
    match tokio::fs::read_to_string(path).await {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Record file names of a log directory; a missing directory has none
async fn list_records(log_dir: &Path) -> Result<HashSet<String>, StorageError> {
    let mut names = HashSet::new();
    let mut entries = match tokio::fs::read_dir(log_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
        Err(e) => return Err(e.into()),
    };
    while let Some(entry) = entries.next_entry().await? {
        if let Some(name) = entry.file_name().to_str()
            && name.ends_with(".json")
        {
            names.insert(name.to_string());
        }
    }
    Ok(names)
}

#[async_trait]
impl SharedStorage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        read_optional(&self.path_for(key)).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.write_atomically(key, &self.path_for(key), value).await?;

        let log_dir = self.log_dir_for(key);
        tokio::fs::create_dir_all(&log_dir).await?;
        let now = get_utc_timestamp();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let record = log_dir.join(record_name(now, seq, &self.writer));
        self.write_atomically(key, &record, value).await?;
        self.prune(&log_dir, now).await;
        Ok(())
    }

    fn watch(&self, key: &str) -> StorageWatch {
        let (sender, receiver) = mpsc::unbounded_channel();
        let log_dir = self.log_dir_for(key);
        let key = key.to_string();
        let writer = self.writer.clone();
        let poll_interval = self.poll_interval;
        // Records present before the watch started are history, not changes.
        // The baseline is taken before returning so no later write is missed.
        let mut seen: HashSet<String> = std::fs::read_dir(&log_dir)
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = sender.closed() => break,
                }
                let names = match list_records(&log_dir).await {
                    Ok(names) => names,
                    Err(e) => {
                        tracing::warn!("Failed to poll '{}': {}", log_dir.display(), e);
                        continue;
                    }
                };
                let mut fresh: Vec<String> = names
                    .iter()
                    .filter(|name| !seen.contains(*name))
                    .cloned()
                    .collect();
                fresh.sort();
                // Forget pruned records so the set stays bounded
                seen.retain(|name| names.contains(name));

                for name in fresh {
                    seen.insert(name.clone());
                    if record_writer(&name) == Some(writer.as_str()) {
                        continue;
                    }
                    let value = match read_optional(&log_dir.join(&name)).await {
                        Ok(Some(value)) => value,
                        Ok(None) => continue,
                        Err(e) => {
                            tracing::warn!("Failed to read change record '{}': {}", name, e);
                            continue;
                        }
                    };
                    if sender.send(value).is_err() {
                        tracing::debug!("Stopped watching '{}'", key);
                        return;
                    }
                }
            }
            tracing::debug!("Stopped watching '{}'", key);
        });

        receiver
    }
}
