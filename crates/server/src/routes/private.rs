use std::{collections::HashSet, sync::Arc};

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use super::gate::normalize_path;

/// Files inside the served directory that must never go out over HTTP:
/// any path with a dot-prefixed segment, plus an explicit list such as the
/// loaded config file.
#[derive(Debug, Clone, Default)]
pub struct PrivateFiles {
    hidden: HashSet<String>,
}

impl PrivateFiles {
    pub fn new<I, S>(hidden: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Arc::new(Self { hidden: hidden.into_iter().map(|p| normalize_path(p.as_ref())).collect() })
    }

    pub fn is_hidden(&self, path: &str) -> bool {
        let path = normalize_path(path);
        path.split('/').any(|segment| segment.starts_with('.')) || self.hidden.contains(&path)
    }
}

/// Middleware: answer 404 for private files, exactly as for a missing one.
pub async fn hide_private_files(State(private): State<Arc<PrivateFiles>>, req: Request, next: Next) -> Response {
    if private.is_hidden(req.uri().path()) {
        warn!(path = %req.uri().path(), "refused request for private file");
        return StatusCode::NOT_FOUND.into_response();
    }
    next.run(req).await
}
