use std::{collections::BTreeMap, io::ErrorKind, marker::PhantomData, path::{Path, PathBuf}, sync::Arc};
use tokio::{fs, sync::Mutex};
use tracing::warn;

use crate::errors::ServiceError;

/// Generic JSON file-backed key-value map store.
///
/// Persists a `BTreeMap<K, V>` as one pretty-printed JSON object. The file is
/// authoritative: every read goes to disk, and every mutation re-reads it,
/// applies a single change and writes the whole document back. Nothing is
/// cached. Mutations are serialized within this process by `write_lock`;
/// nothing guards against other writers of the same file.
pub struct JsonMapStore<K, V> {
    write_lock: Mutex<()>,
    file_path: PathBuf,
    _entries: PhantomData<fn() -> (K, V)>,
}

impl<K, V> JsonMapStore<K, V>
where
    K: Ord + serde::Serialize + serde::de::DeserializeOwned,
    V: serde::Serialize + serde::de::DeserializeOwned,
{
    /// Initialize the store from a path. Creates the file with an empty map if missing.
    pub async fn new<P: Into<PathBuf>>(path: P) -> Result<Arc<Self>, ServiceError> {
        let file_path = path.into();
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await.ok();
        }

        if fs::metadata(&file_path).await.is_err() {
            fs::write(&file_path, b"{}")
                .await
                .map_err(|e| ServiceError::io("create store file", e))?;
        }

        read_map::<K, V>(&file_path).await?;
        Ok(Arc::new(Self { write_lock: Mutex::new(()), file_path, _entries: PhantomData }))
    }

    /// Read the document from disk.
    pub async fn load(&self) -> Result<BTreeMap<K, V>, ServiceError> {
        read_map(&self.file_path).await
    }

    /// Overwrite the document on disk with `map`.
    pub async fn save(&self, map: &BTreeMap<K, V>) -> Result<(), ServiceError> {
        let _guard = self.write_lock.lock().await;
        write_map(&self.file_path, map).await
    }

    /// Insert or overwrite a value by key and persist.
    pub async fn insert(&self, key: K, value: V) -> Result<(), ServiceError> {
        self.update_map(|m| {
            m.insert(key, value);
            Ok(())
        })
        .await
    }

    /// Reload, apply a mutation and persist the whole document.
    /// Nothing is written when the closure fails.
    pub async fn update_map<F>(&self, f: F) -> Result<(), ServiceError>
    where
        F: FnOnce(&mut BTreeMap<K, V>) -> Result<(), ServiceError>,
    {
        let _guard = self.write_lock.lock().await;
        let mut map = read_map(&self.file_path).await?;
        f(&mut map)?;
        write_map(&self.file_path, &map).await
    }
}

/// Missing, empty or unparsable files read as an empty map. Callers that must
/// not lose entries make `V` accept any JSON value.
async fn read_map<K, V>(path: &Path) -> Result<BTreeMap<K, V>, ServiceError>
where
    K: Ord + serde::de::DeserializeOwned,
    V: serde::de::DeserializeOwned,
{
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(ServiceError::io("read store file", e)),
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(BTreeMap::new());
    }
    Ok(serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "store file is not a valid JSON map, treating as empty");
        BTreeMap::new()
    }))
}

async fn write_map<K, V>(path: &Path, map: &BTreeMap<K, V>) -> Result<(), ServiceError>
where
    K: Ord + serde::Serialize,
    V: serde::Serialize,
{
    let data = serde_json::to_vec_pretty(map)?;
    fs::write(path, data).await.map_err(|e| ServiceError::io("write store file", e))
}
