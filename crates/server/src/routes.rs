use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use common::types::Health;

use crate::state::AppState;

pub mod calculator;
pub mod catalog;
pub mod gate;
pub mod private;

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

/// Build the full application router: API routes, static fallback, and the
/// private-file filter and access gate in front of everything.
pub fn build_router(
    state: AppState,
    access_gate: Arc<gate::AccessGate>,
    private_files: Arc<private::PrivateFiles>,
    cors: CorsLayer,
) -> Router {
    let static_dir = ServeDir::new(&state.static_root);
    let upload_limit = match state.upload_limit {
        Some(max) => DefaultBodyLimit::max(max),
        None => DefaultBodyLimit::disable(),
    };

    Router::new()
        .route("/health", get(health))
        .route("/save-calculator-json", post(calculator::save_calculator_json))
        .route("/addDrink", post(catalog::add_drink).layer(upload_limit))
        .route("/removeDrink/:name", delete(catalog::remove_drink))
        .fallback_service(static_dir)
        .with_state(state)
        .layer(middleware::from_fn_with_state(access_gate, gate::require_basic_auth))
        .layer(middleware::from_fn_with_state(private_files, private::hide_private_files))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(
                    DefaultMakeSpan::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}
