//! Dispatches the wildcard media route: splits a request path into the
//! media file path and the HLS suffix that follows it, then routes to
//! the matching handler.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use hls_core::QualityLabel;

use crate::error::ServerError;
use crate::state::AppState;

const KNOWN_EXTENSIONS: &[&str] = &[".mp4", ".mkv", ".webm", ".avi", ".mov"];

/// Splits `full_path` into a media id (the leading path up to and
/// including a known video extension) and the trailing suffix.
pub fn parse_path(full_path: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = full_path.split('/').filter(|s| !s.is_empty()).collect();

    for (i, part) in parts.iter().enumerate() {
        let lower = part.to_lowercase();
        if KNOWN_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            let media_id = parts[..=i].join("/");
            let suffix = parts[i + 1..].join("/");
            return Some((media_id, suffix));
        }
    }

    None
}

fn not_found(path: &str) -> ServerError {
    ServerError::Core(hls_core::HlsError::InvalidPath(format!(
        "no recognized media path in {path}"
    )))
}

pub async fn handle_dynamic_request(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Response {
    let result = dispatch(state, &path).await;
    match result {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn dispatch(state: Arc<AppState>, path: &str) -> Result<Response, ServerError> {
    let (media_id, suffix) = parse_path(path).ok_or_else(|| not_found(path))?;

    if suffix == "master.m3u8" {
        return super::handlers::master_playlist(state, media_id).await;
    }

    let mut segments = suffix.splitn(2, '/');
    let quality_str = segments.next().unwrap_or_default();
    let rest = segments.next();

    if let Some(quality) = QualityLabel::parse(quality_str) {
        match rest {
            Some("playlist.m3u8") => {
                return super::handlers::variant_playlist(state, media_id, quality).await;
            }
            Some(filename) if filename.starts_with("segment_") => {
                return super::handlers::segment(state, media_id, quality, filename.to_string())
                    .await;
            }
            _ => {}
        }
    }

    Err(not_found(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_media_path_from_master_suffix() {
        let (media_id, suffix) = parse_path("library/movie.mp4/master.m3u8").unwrap();
        assert_eq!(media_id, "library/movie.mp4");
        assert_eq!(suffix, "master.m3u8");
    }

    #[test]
    fn splits_media_path_from_segment_suffix() {
        let (media_id, suffix) = parse_path("library/movie.mkv/720p/segment_012.ts").unwrap();
        assert_eq!(media_id, "library/movie.mkv");
        assert_eq!(suffix, "720p/segment_012.ts");
    }

    #[test]
    fn rejects_path_with_no_known_extension() {
        assert!(parse_path("library/notes.txt/master.m3u8").is_none());
    }
}
