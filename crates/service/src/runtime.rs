//! Environment/runtime helpers
//!
//! Sanity checks to ensure expected directories exist at startup.

use configs::StorageConfig;
use tracing::{info, warn};

/// Create the storage root, image and backup directories, seed an empty
/// catalog file if none exists, and warn when the root has no `index.html`.
pub async fn ensure_env(storage: &StorageConfig) -> anyhow::Result<()> {
    for dir in [storage.root.clone(), storage.image_path(), storage.backup_path()] {
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| anyhow::anyhow!("cannot create {}: {e}", dir.display()))?;
    }
    let catalog = storage.catalog_path();
    if tokio::fs::metadata(&catalog).await.is_err() {
        if let Some(parent) = catalog.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&catalog, "{}")
            .await
            .map_err(|e| anyhow::anyhow!("cannot seed {}: {e}", catalog.display()))?;
        info!(path = %catalog.display(), "seeded empty catalog");
    }
    if tokio::fs::metadata(storage.root.join("index.html")).await.is_err() {
        warn!(root = %storage.root.display(), "no index.html under storage root; static pages may 404");
    }
    info!(
        root = %storage.root.display(),
        catalog = %storage.catalog_path().display(),
        images = %storage.image_path().display(),
        "storage layout ready"
    );
    Ok(())
}
