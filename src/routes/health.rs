// src/routes/health.rs
//! Liveness endpoint for the greeter service.
//!
//! This module defines the `/health` route used by container orchestrators
//! (e.g., Docker, Kubernetes) to verify that the process is running and able
//! to answer HTTP requests. It is a sibling module in the `routes` directory
//! and follows the Explicit Module Boundary Pattern (EMBP):
//! - Internal to this file: the endpoint handler
//! - Exports to the gateway (`mod.rs`): a subrouter containing the `/health` route

use axum::{http::StatusCode, routing::get, Router};

/// Handle `GET /health`.
///
/// Always answers `200 OK` with the plain-text body `OK`. Headers, query
/// string and request body are never read, so every call is identical.
async fn health() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// Create a subrouter containing the `/health` route.
///
/// Generic over the application state so it merges cleanly with the gateway
/// router regardless of the state type.
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/health", get(health))
}
