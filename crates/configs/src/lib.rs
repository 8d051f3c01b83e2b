use std::path::{Path, PathBuf};

use anyhow::anyhow;
use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    /// File this configuration was read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
    /// Request body cap for `/addDrink`; `None` disables the limit.
    #[serde(default)]
    pub upload_limit_bytes: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            worker_threads: None,
            upload_limit_bytes: None,
        }
    }
}

/// Locations of the persisted state. Relative entries resolve against `root`.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default = "default_catalog_file")]
    pub catalog_file: PathBuf,
    #[serde(default = "default_calculator_file")]
    pub calculator_file: PathBuf,
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,
    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            catalog_file: default_catalog_file(),
            calculator_file: default_calculator_file(),
            backup_dir: default_backup_dir(),
            image_dir: default_image_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin_user")]
    pub username: String,
    #[serde(default = "default_admin_password")]
    pub password: String,
    #[serde(default = "default_realm")]
    pub realm: String,
    #[serde(default = "default_protected_paths")]
    pub protected_paths: Vec<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: default_admin_user(),
            password: default_admin_password(),
            realm: default_realm(),
            protected_paths: default_protected_paths(),
        }
    }
}

fn default_host() -> String { "0.0.0.0".into() }
fn default_port() -> u16 { 7479 }
fn default_root() -> PathBuf { PathBuf::from(".") }
fn default_catalog_file() -> PathBuf { PathBuf::from("specs.json") }
fn default_calculator_file() -> PathBuf { PathBuf::from("calculator.json") }
fn default_backup_dir() -> PathBuf { PathBuf::from("backups") }
fn default_image_dir() -> PathBuf { PathBuf::from("Images") }
fn default_admin_user() -> String { "admin".into() }
fn default_admin_password() -> String { "Slug123".into() }
fn default_realm() -> String { "admin".into() }
fn default_protected_paths() -> Vec<String> {
    vec!["/modify.html".into(), "/modifyCalculator.html".into()]
}

/// Load `CONFIG_PATH` (default `config.toml`). A missing file yields defaults.
pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    match std::fs::metadata(&path) {
        Ok(_) => load_from_file(&path),
        Err(_) => Ok(AppConfig::default()),
    }
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let mut cfg: AppConfig = toml::from_str(&content)?;
    cfg.source = Some(PathBuf::from(path));
    Ok(cfg)
}

impl AppConfig {
    /// File (or defaults), then process environment, then validation.
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = load_default()?;
        cfg.apply_env_overrides(|key| std::env::var(key).ok())?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    /// Apply `PORT`, `HOST`, `DATA_ROOT`, `ADMIN_USER` and `ADMIN_PASSWORD`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse::<u16>()
                .map_err(|e| anyhow!("PORT must be a valid port number: {e}"))?;
        }
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(root) = lookup("DATA_ROOT") {
            self.storage.root = PathBuf::from(root);
        }
        if let Some(user) = lookup("ADMIN_USER") {
            self.admin.username = user;
        }
        if let Some(password) = lookup("ADMIN_PASSWORD") {
            self.admin.password = password;
        }
        Ok(())
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        self.admin.validate()?;
        Ok(())
    }
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = default_host();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be in 1..=65535"));
        }
        if self.worker_threads == Some(0) {
            self.worker_threads = None;
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl StorageConfig {
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn catalog_path(&self) -> PathBuf { self.resolve(&self.catalog_file) }
    pub fn calculator_path(&self) -> PathBuf { self.resolve(&self.calculator_file) }
    pub fn backup_path(&self) -> PathBuf { self.resolve(&self.backup_dir) }
    pub fn image_path(&self) -> PathBuf { self.resolve(&self.image_dir) }

    /// All paths rooted under `root`, with the default file names.
    pub fn rooted_at<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into(), ..Self::default() }
    }
}

impl AdminConfig {
    fn validate(&self) -> Result<()> {
        if self.username.is_empty() || self.password.is_empty() {
            return Err(anyhow!("admin.username and admin.password must not be empty"));
        }
        if let Some(bad) = self.protected_paths.iter().find(|p| !p.starts_with('/')) {
            return Err(anyhow!("admin.protected_paths entry {bad:?} must start with '/'"));
        }
        Ok(())
    }
}
