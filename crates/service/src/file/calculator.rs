use std::{io::ErrorKind, path::PathBuf, sync::Arc};

use chrono::Utc;
use serde_json::Value;
use tokio::{
    fs::{self, OpenOptions},
    io::AsyncWriteExt,
    sync::Mutex,
};
use tracing::{error, info, warn};

use crate::errors::ServiceError;

/// Result of a blob save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    /// Snapshot of the previous blob, when one could be taken.
    pub backup: Option<PathBuf>,
}

impl SaveOutcome {
    pub fn backed_up(&self) -> bool {
        self.backup.is_some()
    }
}

// Same-millisecond saves get a numeric suffix; give up after this many names.
const MAX_BACKUP_NAMES: u32 = 1000;

/// Calculator configuration blob: an opaque JSON value kept in one file.
///
/// Each save snapshots the previous file into the backup directory first.
/// Snapshots are never overwritten and never read back.
pub struct ConfigBlobStore {
    file_path: PathBuf,
    backup_dir: PathBuf,
    // keeps backup and write of one save from interleaving with another
    write_lock: Mutex<()>,
}

impl ConfigBlobStore {
    pub fn new<P: Into<PathBuf>, B: Into<PathBuf>>(file_path: P, backup_dir: B) -> Arc<Self> {
        Arc::new(Self {
            file_path: file_path.into(),
            backup_dir: backup_dir.into(),
            write_lock: Mutex::new(()),
        })
    }

    /// Current blob, `None` when nothing has been saved yet.
    pub async fn load(&self) -> Result<Option<Value>, ServiceError> {
        match fs::read(&self.file_path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ServiceError::io("read calculator blob", e)),
        }
    }

    /// Back up the current file (best effort), then overwrite it with `blob`.
    pub async fn save(&self, blob: &Value) -> Result<SaveOutcome, ServiceError> {
        let data = serde_json::to_vec_pretty(blob)?;
        let _guard = self.write_lock.lock().await;

        let backup = self.backup_current().await;

        fs::write(&self.file_path, data).await.map_err(|e| {
            error!(path = %self.file_path.display(), error = %e, "error writing calculator blob");
            ServiceError::io("write calculator blob", e)
        })?;
        info!(backup = ?backup, "calculator blob saved");
        Ok(SaveOutcome { backup })
    }

    async fn backup_current(&self) -> Option<PathBuf> {
        if let Err(e) = fs::create_dir_all(&self.backup_dir).await {
            error!(dir = %self.backup_dir.display(), error = %e, "error creating backup directory");
        }

        let current = match fs::read(&self.file_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %self.file_path.display(), "no existing calculator blob to back up");
                return None;
            }
            Err(e) => {
                error!(path = %self.file_path.display(), error = %e, "error reading calculator blob for backup");
                return None;
            }
        };

        let stamp = Utc::now().timestamp_millis();
        for n in 0..MAX_BACKUP_NAMES {
            let name = match n {
                0 => format!("calculator-backup-{stamp}.json"),
                n => format!("calculator-backup-{stamp}-{n}.json"),
            };
            let target = self.backup_dir.join(name);
            let mut file = match OpenOptions::new().write(true).create_new(true).open(&target).await {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    error!(target = %target.display(), error = %e, "error creating backup");
                    return None;
                }
            };
            if let Err(e) = write_all_and_flush(&mut file, &current).await {
                error!(target = %target.display(), error = %e, "error writing backup");
                let _ = fs::remove_file(&target).await;
                return None;
            }
            return Some(target);
        }
        error!(dir = %self.backup_dir.display(), "no free backup name left for this millisecond");
        None
    }
}

async fn write_all_and_flush(file: &mut fs::File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await
}
