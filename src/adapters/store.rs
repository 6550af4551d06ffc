//! Snapshot storage adapters.
//!
//! Both implement [`SnapshotStore`]:
//!
//! - [`MemoryStore`]: postcard blob held in memory.  Survives controller
//!   rebuilds within one process (tests, simulation restarts).
//! - [`FileStore`]: pretty JSON on disk.  Writes go to a sibling temp
//!   file which is then renamed over the target, so a crash mid-save
//!   leaves the previous snapshot intact.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::app::ports::SnapshotStore;
use crate::app::snapshot::ControllerSnapshot;
use crate::error::{Result, StorageError};

// ───────────────────────────────────────────────────────────────
// In-memory store
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryStore {
    blob: Option<Vec<u8>>,
    saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `bytes` (possibly corrupt, for tests).
    pub fn with_blob(bytes: Vec<u8>) -> Self {
        Self {
            blob: Some(bytes),
            saves: 0,
        }
    }

    /// Successful saves since construction.
    pub fn save_count(&self) -> usize {
        self.saves
    }

    pub fn is_empty(&self) -> bool {
        self.blob.is_none()
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Result<Option<ControllerSnapshot>> {
        match self.blob.as_deref() {
            Some(bytes) => ControllerSnapshot::from_postcard(bytes).map(Some),
            None => Ok(None),
        }
    }

    fn save(&mut self, snapshot: &ControllerSnapshot) -> Result<()> {
        let bytes = snapshot.to_postcard()?;
        debug!("MemoryStore: snapshot saved ({} bytes)", bytes.len());
        self.blob = Some(bytes);
        self.saves += 1;
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// JSON file store
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotStore for FileStore {
    fn load(&self) -> Result<Option<ControllerSnapshot>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                warn!("FileStore: read {} failed: {}", self.path.display(), e);
                return Err(StorageError::Io.into());
            }
        };
        let snap: ControllerSnapshot =
            serde_json::from_str(&text).map_err(|_| StorageError::Corrupted)?;
        snap.validate()?;
        info!("FileStore: loaded {}", self.path.display());
        Ok(Some(snap))
    }

    fn save(&mut self, snapshot: &ControllerSnapshot) -> Result<()> {
        let text = serde_json::to_string_pretty(snapshot).map_err(|_| StorageError::Encode)?;
        let tmp = self.temp_path();
        fs::write(&tmp, text.as_bytes()).map_err(|e| {
            warn!("FileStore: write {} failed: {}", tmp.display(), e);
            StorageError::Io
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            warn!("FileStore: rename to {} failed: {}", self.path.display(), e);
            StorageError::Io
        })?;
        debug!("FileStore: saved {}", self.path.display());
        Ok(())
    }
}
