use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use tracing::{debug, error};

use super::AppState;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/", get(handler))
}

/// Handle `GET /`: greet the caller with this host's name.
///
/// A failed hostname lookup is answered with `500` rather than a greeting
/// with an empty name.
async fn handler(State(state): State<AppState>) -> impl IntoResponse {
    // ---
    match state.host.hostname() {
        Ok(hostname) => {
            debug!(%hostname, "GET / - greeting");
            (StatusCode::OK, format!("Greetings from {}\n", hostname)).into_response()
        }
        Err(e) => {
            error!("Failed to get hostname: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to get hostname").into_response()
        }
    }
}
