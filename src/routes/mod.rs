use std::sync::Arc;

use axum::{http::Request, Router};
use tower_http::trace::TraceLayer;
use tracing::Level;

use crate::HostIdentity;

mod greeting;
mod health;

// ---

/// Shared, read-only state handed to every request.
#[derive(Clone)]
pub struct AppState {
    // ---
    pub host: Arc<dyn HostIdentity>,
}

pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(greeting::router())
        .merge(health::router())
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::span!(
                    Level::INFO,
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
        .with_state(state)
}
