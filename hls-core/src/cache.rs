//! On-disk content-addressed segment cache (§4.4).
//!
//! Layout rooted at `cache_root`:
//! `<cache_root>/<media_id>/master.m3u8`
//! `<cache_root>/<media_id>/<quality>/playlist.m3u8`
//! `<cache_root>/<media_id>/<quality>/segment_NNN.ts`

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::QualityLabel;

#[derive(Debug, Clone)]
pub struct SegmentCache {
    root: PathBuf,
}

impl SegmentCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for_master(&self, media: &str) -> PathBuf {
        self.root.join(media).join("master.m3u8")
    }

    pub fn path_for_playlist(&self, media: &str, quality: QualityLabel) -> PathBuf {
        self.root.join(media).join(quality.as_str()).join("playlist.m3u8")
    }

    pub fn path_for_segment(&self, media: &str, quality: QualityLabel, filename: &str) -> PathBuf {
        self.root.join(media).join(quality.as_str()).join(filename)
    }

    pub async fn exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path).await.is_ok()
    }

    /// Creates parent directories, hands a temp path to `producer` to
    /// write the bytes, then renames into place on success. On failure
    /// the temp file is removed and the error propagated; readers never
    /// observe a partially written file under the final name.
    pub async fn write_atomic<F, Fut>(&self, path: &Path, producer: F) -> Result<()>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp_path = tmp_path_for(path);

        match producer(tmp_path.clone()).await {
            Ok(()) => {
                tokio::fs::rename(&tmp_path, path).await?;
                Ok(())
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&tmp_path).await;
                Err(e)
            }
        }
    }

    /// Writes raw bytes atomically; convenience wrapper over `write_atomic`
    /// for producers that already have the full payload in memory
    /// (playlists; tests).
    pub async fn write_atomic_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let owned = bytes.to_vec();
        self.write_atomic(path, |tmp| async move {
            tokio::fs::write(&tmp, &owned).await?;
            Ok(())
        })
        .await
    }

    pub async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(path).await?)
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}
