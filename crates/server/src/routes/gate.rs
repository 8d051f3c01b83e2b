use std::{collections::HashSet, sync::Arc};

use axum::{
    extract::{Request, State},
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::{
    headers::{authorization::Basic, Authorization},
    TypedHeader,
};
use configs::AdminConfig;
use percent_encoding::percent_decode_str;
use tracing::warn;

/// Single shared username/password guarding a fixed set of page paths with
/// HTTP Basic authentication. Stateless: every request carries credentials.
#[derive(Debug, Clone)]
pub struct AccessGate {
    username: String,
    password: String,
    challenge: HeaderValue,
    protected: HashSet<String>,
}

impl AccessGate {
    pub fn new(username: &str, password: &str, realm: &str, protected: &[String]) -> Self {
        let challenge = HeaderValue::from_str(&format!("Basic realm=\"{}\"", realm.replace('"', "")))
            .unwrap_or_else(|_| HeaderValue::from_static("Basic"));
        Self {
            username: username.to_string(),
            password: password.to_string(),
            challenge,
            protected: protected.iter().map(|p| normalize_path(p)).collect(),
        }
    }

    pub fn from_config(cfg: &AdminConfig) -> Arc<Self> {
        Arc::new(Self::new(&cfg.username, &cfg.password, &cfg.realm, &cfg.protected_paths))
    }

    /// Compares after the same decoding the static file service applies, so
    /// `/modify%2Ehtml` or `//modify.html` cannot slip past.
    pub fn is_protected(&self, path: &str) -> bool {
        self.protected.contains(&normalize_path(path))
    }

    pub fn accepts(&self, credentials: &Basic) -> bool {
        credentials.username() == self.username && credentials.password() == self.password
    }

    fn challenge_response(&self) -> Response {
        let mut res = (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        res.headers_mut().insert(WWW_AUTHENTICATE, self.challenge.clone());
        res
    }
}

/// Middleware: require Basic credentials on protected paths only.
pub async fn require_basic_auth(
    State(gate): State<Arc<AccessGate>>,
    credentials: Option<TypedHeader<Authorization<Basic>>>,
    req: Request,
    next: Next,
) -> Response {
    if !gate.is_protected(req.uri().path()) {
        return next.run(req).await;
    }
    match credentials {
        Some(TypedHeader(Authorization(basic))) if gate.accepts(&basic) => next.run(req).await,
        Some(_) => {
            warn!(path = %req.uri().path(), "rejected admin credentials");
            gate.challenge_response()
        }
        None => gate.challenge_response(),
    }
}

/// Percent-decode, then drop empty and `.` segments.
pub(crate) fn normalize_path(path: &str) -> String {
    let decoded = percent_decode_str(path).decode_utf8_lossy();
    let segments: Vec<&str> = decoded
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    format!("/{}", segments.join("/"))
}
