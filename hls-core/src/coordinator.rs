//! `BuildCoordinator` (§4.5): the keyed mutex table over
//! `(media_id, quality, segment_index)` plus the per-`(media, quality)`
//! playlist-materialization latch. At most one encode is ever in flight
//! per key; concurrent duplicate requests await the same completion.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;

use crate::cache::SegmentCache;
use crate::encoder::{EncodeRequest, EncoderTool};
use crate::error::{HlsError, Result};
use crate::planner::find_segment_by_index;
use crate::playlist::{render_master, render_variant};
use crate::types::{Analysis, QualityLabel};

pub struct BuildCoordinator {
    tickets: DashMap<String, Arc<OnceCell<Result<PathBuf>>>>,
    cache: SegmentCache,
    encoder: Arc<dyn EncoderTool>,
    segment_filename_digits: usize,
    target_segment_duration: f64,
}

impl BuildCoordinator {
    pub fn new(
        cache: SegmentCache,
        encoder: Arc<dyn EncoderTool>,
        segment_filename_digits: usize,
        target_segment_duration: f64,
    ) -> Self {
        Self {
            tickets: DashMap::new(),
            cache,
            encoder,
            segment_filename_digits,
            target_segment_duration,
        }
    }

    pub fn cache(&self) -> &SegmentCache {
        &self.cache
    }

    /// Runs `build` under the keyed ticket for `key`, coalescing
    /// concurrent callers onto a single execution and releasing the
    /// ticket once the result has been observed.
    async fn coordinate<F, Fut>(&self, key: String, build: F) -> Result<PathBuf>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<PathBuf>>,
    {
        let cell = self
            .tickets
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let result = cell.get_or_init(build).await.clone();
        self.tickets.remove(&key);
        result
    }

    /// Produces (or returns the already-cached) segment at `index` for
    /// `(media_id, quality)`, guaranteeing at most one live encoder
    /// subprocess per key.
    pub async fn ensure_segment(
        &self,
        media_id: &str,
        analysis: &Analysis,
        quality: QualityLabel,
        index: usize,
    ) -> Result<PathBuf> {
        let spec = find_segment_by_index(&analysis.segment_plan, index)
            .ok_or_else(|| HlsError::InvalidSegmentName(format!("no such segment index: {index}")))?;
        let profile = analysis
            .profile_for(quality)
            .ok_or_else(|| HlsError::UnknownQuality(quality.to_string()))?;

        let filename = spec.filename(self.segment_filename_digits);
        let path = self.cache.path_for_segment(media_id, quality, &filename);

        if self.cache.exists(&path).await {
            return Ok(path);
        }

        let key = format!("{media_id}:{quality}:{index}");
        let seek_pts = spec.start_pts;
        let duration = spec.duration();
        let has_audio = analysis.source_audio_codec.is_some();

        self.coordinate(key, || async {
            // Re-check under the ticket: another process/build may have
            // created the file while we were waiting to become builder.
            if self.cache.exists(&path).await {
                return Ok(path.clone());
            }

            let cache = &self.cache;
            let encoder = &self.encoder;
            let source_path = &analysis.source_path;
            let target_segment_duration = self.target_segment_duration;
            let source_width = analysis.source_width;
            let source_height = analysis.source_height;
            let source_fps = analysis.source_fps;

            cache
                .write_atomic(&path, move |tmp_path| async move {
                    let req = EncodeRequest {
                        source_path,
                        seek_pts,
                        duration,
                        profile,
                        source_width,
                        source_height,
                        source_fps,
                        target_segment_duration,
                        has_audio,
                        out_path_tmp: &tmp_path,
                    };
                    encoder.encode_segment(req).await
                })
                .await?;

            Ok(path.clone())
        })
        .await
    }

    /// Ensures the master playlist exists on disk, materializing it
    /// exactly once per process-lifetime per media.
    pub async fn ensure_master_playlist(&self, media_id: &str, analysis: &Analysis) -> Result<PathBuf> {
        let path = self.cache.path_for_master(media_id);
        if self.cache.exists(&path).await {
            return Ok(path);
        }
        let key = format!("{media_id}:_master");
        self.coordinate(key, || async {
            if self.cache.exists(&path).await {
                return Ok(path.clone());
            }
            let content = render_master(analysis);
            self.cache.write_atomic_bytes(&path, content.as_bytes()).await?;
            Ok(path.clone())
        })
        .await
    }

    /// Ensures the variant playlist for `(media_id, quality)` exists on
    /// disk, materializing it exactly once per process-lifetime per key.
    pub async fn ensure_variant_playlist(
        &self,
        media_id: &str,
        analysis: &Analysis,
        quality: QualityLabel,
    ) -> Result<PathBuf> {
        analysis
            .profile_for(quality)
            .ok_or_else(|| HlsError::UnknownQuality(quality.to_string()))?;

        let path = self.cache.path_for_playlist(media_id, quality);
        if self.cache.exists(&path).await {
            return Ok(path);
        }
        let key = format!("{media_id}:{quality}:_playlist");
        self.coordinate(key, || async {
            if self.cache.exists(&path).await {
                return Ok(path.clone());
            }
            let content = render_variant(analysis, self.segment_filename_digits);
            self.cache.write_atomic_bytes(&path, content.as_bytes()).await?;
            Ok(path.clone())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Keyframe, QualityProfile, SegmentSpec};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc as StdArc;

    struct CountingEncoder {
        calls: StdArc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl EncoderTool for CountingEncoder {
        async fn encode_segment(&self, req: EncodeRequest<'_>) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                // Simulate a partial write before failing (Scenario F).
                tokio::fs::write(req.out_path_tmp, b"partial").await.ok();
                return Err(HlsError::Encoder(crate::error::EncoderError::ExitStatus {
                    code: Some(1),
                    stderr_tail: "boom".into(),
                }));
            }
            tokio::fs::write(req.out_path_tmp, b"tsdata").await?;
            Ok(())
        }
    }

    fn analysis() -> Analysis {
        Analysis {
            source_path: "/media/movie.mp4".into(),
            container_duration_seconds: 20.0,
            source_width: 1280,
            source_height: 720,
            source_fps: 30.0,
            source_video_codec: "h264".into(),
            source_audio_codec: Some("aac".into()),
            keyframes: vec![Keyframe { index: 0, pts: 0.0 }],
            eligible_profiles: vec![QualityProfile {
                label: QualityLabel::P720,
                width: 1280,
                height: 720,
                video_bitrate: 3_000_000,
                max_bitrate: 3_500_000,
                buffer_size: 6_000_000,
                audio_bitrate: 128_000,
            }],
            segment_plan: vec![SegmentSpec {
                index: 5,
                start_pts: 30.0,
                end_pts: 36.0,
                start_keyframe_idx: 5,
                end_keyframe_idx: 6,
            }],
        }
    }

    #[tokio::test]
    async fn scenario_e_concurrent_requests_invoke_encoder_once() {
        let dir = tempfile::tempdir().unwrap();
        let calls = StdArc::new(AtomicUsize::new(0));
        let encoder: Arc<dyn EncoderTool> = Arc::new(CountingEncoder {
            calls: calls.clone(),
            fail: false,
        });
        let coordinator = Arc::new(BuildCoordinator::new(
            SegmentCache::new(dir.path()),
            encoder,
            3,
            6.0,
        ));
        let analysis = Arc::new(analysis());

        let mut handles = Vec::new();
        for _ in 0..10 {
            let coordinator = coordinator.clone();
            let analysis = analysis.clone();
            handles.push(tokio::spawn(async move {
                coordinator
                    .ensure_segment("movie.mp4", &analysis, QualityLabel::P720, 5)
                    .await
            }));
        }

        let mut paths = Vec::new();
        for h in handles {
            paths.push(h.await.unwrap().unwrap());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for p in &paths {
            assert_eq!(p, &paths[0]);
        }
        assert_eq!(tokio::fs::read(&paths[0]).await.unwrap(), b"tsdata");
    }

    #[tokio::test]
    async fn scenario_f_partial_write_leaves_no_tmp_and_next_call_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let calls = StdArc::new(AtomicUsize::new(0));
        let failing: Arc<dyn EncoderTool> = Arc::new(CountingEncoder {
            calls: calls.clone(),
            fail: true,
        });
        let coordinator = BuildCoordinator::new(SegmentCache::new(dir.path()), failing, 3, 6.0);
        let analysis = analysis();

        let err = coordinator
            .ensure_segment("movie.mp4", &analysis, QualityLabel::P720, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, HlsError::Encoder(_)));

        let final_path = coordinator.cache().path_for_segment(
            "movie.mp4",
            QualityLabel::P720,
            "segment_005.ts",
        );
        assert!(!coordinator.cache().exists(&final_path).await);
        let tmp_path = {
            let mut p = final_path.clone().into_os_string();
            p.push(".tmp");
            PathBuf::from(p)
        };
        assert!(!coordinator.cache().exists(&tmp_path).await);

        let succeeding: Arc<dyn EncoderTool> = Arc::new(CountingEncoder {
            calls: StdArc::new(AtomicUsize::new(0)),
            fail: false,
        });
        let coordinator = BuildCoordinator::new(SegmentCache::new(dir.path()), succeeding, 3, 6.0);
        let path = coordinator
            .ensure_segment("movie.mp4", &analysis, QualityLabel::P720, 5)
            .await
            .unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"tsdata");
    }
}
