//! Playlist and segment handlers. Each resolves through the facade and
//! streams the resulting file with the headers recommended in the HTTP
//! layer module (§6): long-lived immutable caching for segments, short
//! caching for playlists since a playlist can still be growing.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use hls_core::QualityLabel;

use crate::error::{Result, ServerError};
use crate::state::AppState;

const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
const SEGMENT_CONTENT_TYPE: &str = "video/mp2t";

async fn serve_file(
    path: std::path::PathBuf,
    content_type: &str,
    immutable: bool,
    with_etag: bool,
) -> Result<Response> {
    let bytes = tokio::fs::read(&path).await.map_err(ServerError::Io)?;
    let cache_control = if immutable {
        "public, max-age=31536000, immutable"
    } else {
        "public, max-age=3600"
    };

    let mut response = (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap()),
            (header::CACHE_CONTROL, HeaderValue::from_static(cache_control)),
        ],
        Body::from(bytes.clone()),
    )
        .into_response();

    if with_etag {
        if let Ok(metadata) = tokio::fs::metadata(&path).await {
            let mtime_secs = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(0);
            let etag = format!("\"{:x}-{:x}\"", bytes.len(), mtime_secs);
            if let Ok(value) = HeaderValue::from_str(&etag) {
                response.headers_mut().insert(header::ETAG, value);
            }
        }
    }

    Ok(response)
}

/// Records a cache hit/miss for a response keyed by `path`, checking
/// existence before the facade call would have materialized it.
async fn record_cache_outcome(state: &AppState, path: &std::path::Path) {
    if state.facade.cache().exists(path).await {
        state.metrics.record_cache_hit();
    } else {
        state.metrics.record_cache_miss();
    }
}

pub async fn master_playlist(state: Arc<AppState>, media_id: String) -> Result<Response> {
    let pre_existing = state.facade.cache().path_for_master(&media_id);
    record_cache_outcome(&state, &pre_existing).await;
    let path = state.facade.get_master_playlist(&media_id).await?;
    serve_file(path, PLAYLIST_CONTENT_TYPE, false, true).await
}

pub async fn variant_playlist(
    state: Arc<AppState>,
    media_id: String,
    quality: QualityLabel,
) -> Result<Response> {
    let pre_existing = state.facade.cache().path_for_playlist(&media_id, quality);
    record_cache_outcome(&state, &pre_existing).await;
    let path = state.facade.get_variant_playlist(&media_id, quality).await?;
    serve_file(path, PLAYLIST_CONTENT_TYPE, false, true).await
}

pub async fn segment(
    state: Arc<AppState>,
    media_id: String,
    quality: QualityLabel,
    filename: String,
) -> Result<Response> {
    let pre_existing = state.facade.cache().path_for_segment(&media_id, quality, &filename);
    record_cache_outcome(&state, &pre_existing).await;
    let path = state.facade.get_segment(&media_id, quality, &filename).await?;
    serve_file(path, SEGMENT_CONTENT_TYPE, true, false).await
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn version_check() -> impl IntoResponse {
    (StatusCode::OK, env!("CARGO_PKG_VERSION"))
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.export_prometheus(),
    )
}
