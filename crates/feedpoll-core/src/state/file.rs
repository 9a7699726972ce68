// # File Watermark Store
//
// File-based implementation of WatermarkStore with crash recovery.
//
// ## Crash Recovery
//
// - Atomic writes: write to `<path>.tmp`, then rename over the state file
// - Backup: the previous good file is copied to `<path>.backup` before each write
// - Recovery: a state file that fails to parse is replaced from the backup
// - Writes are serialized: snapshot, temp write, backup and rename all happen
//   under one write lock, so the file always holds the latest complete state
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "sources": {
//     "example": {
//       "watermark": 1710072000,
//       "updated_at": "2024-03-10T12:00:05Z"
//     }
//   }
// }
// ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

use crate::Error;
use crate::traits::watermark_store::{WatermarkRecord, WatermarkStore};

/// State file format version
const STATE_FILE_VERSION: &str = "1.0";

/// File-based watermark store
///
/// Every change is written through immediately, so `flush` only has work to
/// do after a failed write.
///
/// # Example
///
/// ```rust,no_run
/// use feedpoll_core::state::FileWatermarkStore;
/// use feedpoll_core::traits::WatermarkStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileWatermarkStore::new("/var/lib/feedpoll/state.json").await?;
///     store.advance_watermark("example", 1_710_072_000).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileWatermarkStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
    /// Held for the whole serialize → write → backup → rename sequence
    write_lock: Mutex<()>,
}

#[derive(Debug)]
struct FileState {
    sources: HashMap<String, WatermarkRecord>,
    dirty: bool,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct StateFileFormat {
    version: String,
    sources: HashMap<String, WatermarkRecord>,
}

/// Why a state file could not be loaded
enum LoadFailure {
    /// Content did not parse; recoverable from backup
    Corrupt(String),
    /// The file could not be read at all
    Io(Error),
}

impl FileWatermarkStore {
    /// Create or load a file watermark store
    ///
    /// 1. Create parent directories if needed
    /// 2. Load the existing state file, if any
    /// 3. If it is corrupted, load the backup and restore it
    /// 4. If the backup is missing or corrupted too, start empty
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create state directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let sources = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState {
                sources,
                dirty: false,
            })),
            write_lock: Mutex::new(()),
        })
    }

    /// Path of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_with_recovery(path: &Path) -> Result<HashMap<String, WatermarkRecord>, Error> {
        let reason = match Self::load(path).await {
            Ok(sources) => {
                tracing::debug!("Loaded watermarks for {} source(s)", sources.len());
                return Ok(sources);
            }
            Err(LoadFailure::Io(e)) => return Err(e),
            Err(LoadFailure::Corrupt(reason)) => reason,
        };

        tracing::warn!(
            "State file {} is corrupted ({}). Attempting recovery from backup.",
            path.display(),
            reason
        );

        let backup = Self::backup_path(path);
        if !backup.exists() {
            tracing::warn!("No backup file found. Starting with empty state.");
            return Ok(HashMap::new());
        }

        match Self::load(&backup).await {
            Ok(sources) => {
                tracing::info!("Recovered {} source(s) from backup", sources.len());
                if let Err(e) = fs::copy(&backup, path).await {
                    tracing::error!("Failed to restore state file from backup: {}", e);
                }
                Ok(sources)
            }
            Err(LoadFailure::Corrupt(e)) => {
                tracing::error!("Backup also corrupted: {}. Starting with empty state.", e);
                Ok(HashMap::new())
            }
            Err(LoadFailure::Io(e)) => {
                tracing::error!("Backup unreadable: {}. Starting with empty state.", e);
                Ok(HashMap::new())
            }
        }
    }

    async fn load(path: &Path) -> Result<HashMap<String, WatermarkRecord>, LoadFailure> {
        if !path.exists() {
            tracing::debug!("State file does not exist: {}", path.display());
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            LoadFailure::Io(Error::state_store(format!(
                "Failed to read state file {}: {}",
                path.display(),
                e
            )))
        })?;

        let file: StateFileFormat =
            serde_json::from_str(&content).map_err(|e| LoadFailure::Corrupt(e.to_string()))?;

        if file.version != STATE_FILE_VERSION {
            tracing::warn!(
                "State file version mismatch: expected {}, got {}. Loading anyway.",
                STATE_FILE_VERSION,
                file.version
            );
        }

        Ok(file.sources)
    }

    /// Write the current state atomically
    async fn write_state(&self) -> Result<(), Error> {
        let _write_guard = self.write_lock.lock().await;

        // Snapshot after taking the write lock so the newest state wins
        let json = {
            let guard = self.state.read().await;
            let file = StateFileFormat {
                version: STATE_FILE_VERSION.to_string(),
                sources: guard.sources.clone(),
            };
            serde_json::to_string_pretty(&file)?
        };

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.flush().await?;
        }

        if self.path.exists() {
            if let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        self.state.write().await.dirty = false;
        tracing::trace!("State written to {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl WatermarkStore for FileWatermarkStore {
    async fn get_watermark(&self, source_id: &str) -> Result<i64, Error> {
        let guard = self.state.read().await;
        Ok(guard.sources.get(source_id).map_or(0, |r| r.watermark))
    }

    async fn get_record(&self, source_id: &str) -> Result<Option<WatermarkRecord>, Error> {
        let guard = self.state.read().await;
        Ok(guard.sources.get(source_id).cloned())
    }

    async fn advance_watermark(&self, source_id: &str, watermark: i64) -> Result<bool, Error> {
        {
            let mut guard = self.state.write().await;
            let current = guard.sources.get(source_id).map_or(0, |r| r.watermark);
            if watermark <= current {
                return Ok(false);
            }
            guard
                .sources
                .insert(source_id.to_string(), WatermarkRecord::new(watermark));
            guard.dirty = true;
        }

        self.write_state().await?;
        Ok(true)
    }

    async fn delete_record(&self, source_id: &str) -> Result<(), Error> {
        {
            let mut guard = self.state.write().await;
            if guard.sources.remove(source_id).is_none() {
                return Ok(());
            }
            guard.dirty = true;
        }

        self.write_state().await
    }

    async fn list_sources(&self) -> Result<Vec<String>, Error> {
        let guard = self.state.read().await;
        Ok(guard.sources.keys().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        let dirty = self.state.read().await.dirty;
        if dirty {
            self.write_state().await
        } else {
            Ok(())
        }
    }
}
