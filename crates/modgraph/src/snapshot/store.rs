//! Durable storage for published snapshots.
//!
//! # Atomicity
//!
//! [`FileSnapshotStore`] never writes the target file in place. The record is
//! written to a sibling temporary file, flushed, and renamed over the target.
//! Renames within one filesystem are atomic on POSIX systems, so a crash or a
//! cancelled rebuild leaves either the old record or the new one, never a torn
//! file. A stray temporary file may be left behind; the next successful save
//! replaces it.
//!
//! # Loading
//!
//! A missing or unparsable snapshot file means "no prior snapshot". Loading
//! logs the problem and returns `Ok(None)` instead of failing.

use super::SnapshotRecord;
use crate::error::Result;
use async_trait::async_trait;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Persistence backend for snapshot records.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the last saved record, or `None` if there is no usable one.
    async fn load(&self) -> Result<Option<SnapshotRecord>>;

    /// Persist a record, replacing any previous one.
    async fn save(&self, record: &SnapshotRecord) -> Result<()>;
}

/// Snapshot store backed by a JSON file.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    /// Create a store for the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self) -> Result<Option<SnapshotRecord>> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No prior snapshot");
                return Ok(None);
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cannot read snapshot; starting empty");
                return Ok(None);
            }
        };

        match serde_json::from_slice(&content) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Unparsable snapshot; starting empty");
                Ok(None)
            }
        }
    }

    async fn save(&self, record: &SnapshotRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let temp_path = make_temp_path(&self.path);
        if let Err(e) = write_record(&temp_path, record).await {
            // Best-effort cleanup; the original file is untouched.
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e);
        }

        tokio::fs::rename(&temp_path, &self.path).await?;
        debug!(path = %self.path.display(), "Snapshot persisted");
        Ok(())
    }
}

/// Sibling temp path: `snapshot.json` becomes `snapshot.json.tmp`.
fn make_temp_path(path: &Path) -> PathBuf {
    let mut temp_path = path.to_path_buf();
    let new_extension = match path.extension() {
        Some(ext) => {
            let mut new_ext = ext.to_os_string();
            new_ext.push(".tmp");
            new_ext
        }
        None => OsString::from("tmp"),
    };
    temp_path.set_extension(new_extension);
    temp_path
}

async fn write_record(temp_path: &Path, record: &SnapshotRecord) -> Result<()> {
    let json = serde_json::to_vec_pretty(record)?;
    let file = File::create(temp_path).await?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&json).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    writer.get_ref().sync_all().await?;
    Ok(())
}

/// Snapshot store that keeps the last record in memory.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    record: Mutex<Option<SnapshotRecord>>,
    saves: AtomicUsize,
}

impl MemorySnapshotStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `record`.
    #[must_use]
    pub fn with_record(record: SnapshotRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
            saves: AtomicUsize::new(0),
        }
    }

    /// Number of successful saves.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self) -> Result<Option<SnapshotRecord>> {
        Ok(self.record.lock().await.clone())
    }

    async fn save(&self, record: &SnapshotRecord) -> Result<()> {
        *self.record.lock().await = Some(record.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
