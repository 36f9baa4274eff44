//! `AnalysisStore` + `AnalysisBuilder` (§3, §4.7).
//!
//! Analysis is built lazily on first access and lives for the process
//! lifetime; concurrent first-requests for the same media are coalesced
//! through a per-media `OnceCell`, the same pattern the coordinator uses
//! for segment builds.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;

use crate::error::Result;
use crate::planner::build_segment_plan;
use crate::profile::select_profiles;
use crate::probe::ProbeTool;
use crate::repository::MediaRepository;
use crate::types::{Analysis, MediaId};

pub struct AnalysisStore {
    built: DashMap<MediaId, Arc<Analysis>>,
    in_flight: DashMap<MediaId, Arc<OnceCell<Result<Arc<Analysis>>>>>,
}

impl Default for AnalysisStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisStore {
    pub fn new() -> Self {
        Self {
            built: DashMap::new(),
            in_flight: DashMap::new(),
        }
    }

    /// Fast-path: `Analysis` already built for this media.
    pub fn get(&self, media_id: &MediaId) -> Option<Arc<Analysis>> {
        self.built.get(media_id).map(|r| r.clone())
    }

    /// Returns the `Analysis` for `media_id`, building it on first access.
    /// Concurrent callers for the same id share one build.
    pub async fn get_or_build(
        &self,
        media_id: &MediaId,
        repository: &dyn MediaRepository,
        probe: &dyn ProbeTool,
        target_segment_duration: f64,
    ) -> Result<Arc<Analysis>> {
        if let Some(existing) = self.get(media_id) {
            return Ok(existing);
        }

        let cell = self
            .in_flight
            .entry(media_id.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let result = cell
            .get_or_init(|| async {
                build_analysis(repository, probe, media_id, target_segment_duration).await
            })
            .await
            .clone();

        if let Ok(ref analysis) = result {
            self.built.insert(media_id.clone(), analysis.clone());
        }
        self.in_flight.remove(media_id);

        result
    }
}

async fn build_analysis(
    repository: &dyn MediaRepository,
    probe: &dyn ProbeTool,
    media_id: &MediaId,
    target_segment_duration: f64,
) -> Result<Arc<Analysis>> {
    let record = repository.find_by_id(media_id).await?;
    let format = probe.probe_format(&record.source_path).await?;
    let keyframes = probe.probe_keyframes(&record.source_path).await?;
    let eligible_profiles = select_profiles(format.width, format.height);
    let segment_plan = build_segment_plan(&keyframes, target_segment_duration, format.duration)?;

    Ok(Arc::new(Analysis {
        source_path: record.source_path,
        container_duration_seconds: format.duration,
        source_width: format.width,
        source_height: format.height,
        source_fps: format.fps,
        source_video_codec: format.video_codec,
        source_audio_codec: format.audio_codec,
        keyframes,
        eligible_profiles,
        segment_plan,
    }))
}
