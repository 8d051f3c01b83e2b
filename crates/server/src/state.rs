use std::{path::PathBuf, sync::Arc};

use service::file::{calculator::ConfigBlobStore, catalog::CatalogStore};

/// Shared handler state; stores are injected rather than reached globally.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogStore>,
    pub calculator: Arc<ConfigBlobStore>,
    /// Directory served for every path without an explicit route.
    pub static_root: PathBuf,
    /// Body cap for `/addDrink`; `None` means unlimited.
    pub upload_limit: Option<usize>,
}
