use std::{path::Path, sync::Arc};

use axum::Router;
use configs::AppConfig;
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::routes::{self, gate::AccessGate, private::PrivateFiles};
use crate::state::AppState;
use service::{
    file::{calculator::ConfigBlobStore, catalog::CatalogStore, images::ImageStore},
    runtime,
};

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

/// Prepare the on-disk layout, open the stores and assemble the router.
pub async fn build_app(cfg: &AppConfig) -> anyhow::Result<Router> {
    let storage = &cfg.storage;
    runtime::ensure_env(storage).await?;

    let images = ImageStore::new(storage.image_path()).await?;
    let catalog = CatalogStore::new(storage.catalog_path(), Arc::clone(&images)).await?;
    let calculator = ConfigBlobStore::new(storage.calculator_path(), storage.backup_path());

    let state = AppState {
        catalog,
        calculator,
        static_root: storage.root.clone(),
        upload_limit: cfg.server.upload_limit_bytes,
    };
    let gate = AccessGate::from_config(&cfg.admin);

    let mut hidden = Vec::new();
    if let Some(source) = cfg.source.as_deref() {
        if let Some(served) = served_path(&storage.root, source).await {
            warn!(path = %served, "config file lives under the static root; hiding it");
            hidden.push(served);
        }
    }
    let private_files = PrivateFiles::new(hidden);

    Ok(routes::build_router(state, gate, private_files, build_cors()))
}

/// URL path under which `file` would be served from `root`, if it is inside it.
async fn served_path(root: &Path, file: &Path) -> Option<String> {
    let root = tokio::fs::canonicalize(root).await.ok()?;
    let file = tokio::fs::canonicalize(file).await.ok()?;
    let relative = file.strip_prefix(&root).ok()?;
    let segments: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(format!("/{}", segments.join("/")))
}

/// Public entry: load configuration, build the app and run the HTTP server
pub async fn run() -> anyhow::Result<()> {
    dotenv().ok();
    let cfg = AppConfig::load_and_validate()?;
    run_with_config(cfg).await
}

pub async fn run_with_config(cfg: AppConfig) -> anyhow::Result<()> {
    let app = build_app(&cfg).await?;

    let addr = cfg.server.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "Server running");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
