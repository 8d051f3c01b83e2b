use std::{io::ErrorKind, path::PathBuf, sync::Arc};

use chrono::Utc;
use tokio::fs;
use tracing::{info, warn};

use crate::errors::ServiceError;

/// Directory of uploaded drink images.
///
/// Files are named `<unix-millis>-<original name>`. Nothing checks type, size
/// or extension.
#[derive(Clone, Debug)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub async fn new<P: Into<PathBuf>>(dir: P) -> Result<Arc<Self>, ServiceError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| ServiceError::io("create image directory", e))?;
        Ok(Arc::new(Self { dir }))
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Path an image filename resolves to inside the directory.
    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    /// Write an uploaded file and return the name it was stored under.
    /// Returns `None` when the upload carried no usable filename, which is how
    /// browsers submit an empty file input.
    pub async fn store(&self, original_name: &str, bytes: &[u8]) -> Result<Option<String>, ServiceError> {
        let Some(base) = base_name(original_name) else {
            return Ok(None);
        };
        let filename = format!("{}-{}", Utc::now().timestamp_millis(), base);
        fs::write(self.path_for(&filename), bytes)
            .await
            .map_err(|e| ServiceError::io("write uploaded image", e))?;
        info!(image = %filename, size = bytes.len(), "stored uploaded image");
        Ok(Some(filename))
    }

    /// Best-effort delete. Returns whether a file was removed; a missing file or
    /// a failed removal is logged and swallowed.
    pub async fn delete(&self, filename: &str) -> bool {
        if base_name(filename).as_deref() != Some(filename) {
            warn!(image = %filename, "refusing to delete image outside the image directory");
            return false;
        }
        match fs::remove_file(self.path_for(filename)).await {
            Ok(()) => {
                info!(image = %filename, "deleted image");
                true
            }
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                warn!(image = %filename, error = %e, "failed to delete image");
                false
            }
        }
    }
}

/// Last path component of a client-supplied filename, accepting either
/// separator. Empty names and dot entries yield `None`.
fn base_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    match base {
        "" | "." | ".." => None,
        _ => Some(base.to_string()),
    }
}
