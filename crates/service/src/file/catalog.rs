use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::errors::ServiceError;
use crate::file::images::ImageStore;
use crate::storage::json_map_store::JsonMapStore;

/// One drink. `ingredients` is whatever JSON the caller supplied.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DrinkRecord {
    /// Filename inside the image directory; serialized as `null` when absent.
    #[serde(default)]
    pub image: Option<String>,
    pub ingredients: Value,
    /// Fields of hand-edited records that this server does not know about.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DrinkRecord {
    pub fn new(ingredients: Value, image: Option<String>) -> Self {
        Self { image, ingredients, extra: Map::new() }
    }
}

/// A value under one catalog name. Anything that is not shaped like a drink
/// is kept as raw JSON and written back untouched.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CatalogEntry {
    Drink(DrinkRecord),
    Other(Value),
}

impl CatalogEntry {
    pub fn as_drink(&self) -> Option<&DrinkRecord> {
        match self {
            CatalogEntry::Drink(record) => Some(record),
            CatalogEntry::Other(_) => None,
        }
    }
}

pub type CatalogDocument = BTreeMap<String, CatalogEntry>;

/// Drink name to record mapping persisted as one JSON file.
///
/// Names are case-sensitive. Adding an existing name overwrites it.
#[derive(Clone)]
pub struct CatalogStore {
    store: Arc<JsonMapStore<String, CatalogEntry>>,
    images: Arc<ImageStore>,
}

impl CatalogStore {
    /// Open the catalog file, seeding `{}` if missing.
    pub async fn new<P: Into<PathBuf>>(path: P, images: Arc<ImageStore>) -> Result<Arc<Self>, ServiceError> {
        let store = JsonMapStore::<String, CatalogEntry>::new(path).await?;
        Ok(Arc::new(Self { store, images }))
    }

    pub fn images(&self) -> &Arc<ImageStore> {
        &self.images
    }

    /// Whole document; a missing file or one that is not JSON reads as empty.
    pub async fn load(&self) -> Result<CatalogDocument, ServiceError> {
        self.store.load().await
    }

    /// Overwrite the catalog file with `document`.
    pub async fn save(&self, document: &CatalogDocument) -> Result<(), ServiceError> {
        self.store.save(document).await
    }

    /// Insert or overwrite `name`. `ingredients` is the JSON-encoded text the
    /// client submitted and is parsed before storage.
    pub async fn add(&self, name: &str, ingredients: &str, image: Option<String>) -> Result<DrinkRecord, ServiceError> {
        if name.is_empty() || ingredients.is_empty() {
            return Err(ServiceError::Validation("Missing data".into()));
        }
        let ingredients: Value = serde_json::from_str(ingredients).map_err(|e| {
            warn!(name = %name, error = %e, "rejecting drink with malformed ingredients");
            ServiceError::Validation("Malformed ingredients".into())
        })?;

        let record = DrinkRecord::new(ingredients, image);
        self.store.insert(name.to_string(), CatalogEntry::Drink(record.clone())).await?;
        info!(name = %name, image = ?record.image, "drink saved");
        Ok(record)
    }

    /// Drop `name` and, after the catalog is persisted, its image file.
    pub async fn remove(&self, name: &str) -> Result<CatalogEntry, ServiceError> {
        let mut removed = None;
        self.store
            .update_map(|map| {
                removed = Some(map.remove(name).ok_or_else(|| ServiceError::not_found("drink"))?);
                Ok(())
            })
            .await?;
        let entry = removed.ok_or_else(|| ServiceError::not_found("drink"))?;

        if let Some(image) = entry.as_drink().and_then(|r| r.image.as_deref()) {
            self.images.delete(image).await;
        }
        info!(name = %name, "drink removed");
        Ok(entry)
    }
}
