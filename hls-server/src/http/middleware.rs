//! HTTP middleware
//!
//! Request logging, plus recording each completed request's status class
//! into `Metrics`. Rate limiting and connection limiting live in
//! `crate::limits`, which owns the real token-bucket implementation.

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::state::AppState;

pub async fn request_logger(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();
    state.metrics.record_request(status);

    if status.is_success() || status.is_redirection() {
        info!(%method, %uri, %status, ?duration, "request");
    } else {
        warn!(%method, %uri, %status, ?duration, "request");
    }

    response
}
