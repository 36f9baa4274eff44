//! `MediaRepository`: the narrow collaborator that resolves a `MediaId`
//! to a source path (§6). The core only depends on the trait; a thin
//! filesystem-backed adapter satisfies it for a personal server that has
//! no separate catalog database.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{HlsError, Result};
use crate::types::MediaId;

#[derive(Debug, Clone)]
pub struct MediaRecord {
    pub source_path: PathBuf,
}

#[async_trait]
pub trait MediaRepository: Send + Sync {
    async fn find_by_id(&self, media_id: &MediaId) -> Result<MediaRecord>;
}

/// Resolves a `MediaId` as a URL-safe relative path rooted at `media_root`.
/// Rejects ids containing `..` components, NUL bytes, or an absolute
/// path, mirroring the path validation ProbeTool requires of its own
/// input (§4.1).
pub struct FsMediaRepository {
    media_root: PathBuf,
}

impl FsMediaRepository {
    pub fn new(media_root: impl Into<PathBuf>) -> Self {
        Self {
            media_root: media_root.into(),
        }
    }

    fn resolve(&self, media_id: &str) -> Result<PathBuf> {
        if media_id.contains('\0') {
            return Err(HlsError::InvalidPath(format!(
                "media id contains a NUL byte: {media_id}"
            )));
        }
        let relative = Path::new(media_id);
        if relative.is_absolute() {
            return Err(HlsError::InvalidPath(format!(
                "media id must be relative: {media_id}"
            )));
        }
        if relative
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(HlsError::InvalidPath(format!(
                "media id contains a parent-traversal component: {media_id}"
            )));
        }
        Ok(self.media_root.join(relative))
    }
}

#[async_trait]
impl MediaRepository for FsMediaRepository {
    async fn find_by_id(&self, media_id: &MediaId) -> Result<MediaRecord> {
        let path = self.resolve(media_id)?;
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|_| HlsError::MediaNotFound(media_id.clone()))?;
        if !meta.is_file() {
            return Err(HlsError::MediaNotFound(media_id.clone()));
        }
        Ok(MediaRecord { source_path: path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_a_plain_relative_id() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("movie.mp4"), b"x").await.unwrap();
        let repo = FsMediaRepository::new(dir.path());
        let record = repo.find_by_id(&"movie.mp4".to_string()).await.unwrap();
        assert_eq!(record.source_path, dir.path().join("movie.mp4"));
    }

    #[tokio::test]
    async fn rejects_parent_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsMediaRepository::new(dir.path());
        let err = repo.find_by_id(&"../secret".to_string()).await.unwrap_err();
        assert!(matches!(err, HlsError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsMediaRepository::new(dir.path());
        let err = repo.find_by_id(&"nope.mp4".to_string()).await.unwrap_err();
        assert!(matches!(err, HlsError::MediaNotFound(_)));
    }
}
