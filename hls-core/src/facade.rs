//! `StreamingFacade` (§4.6): the public surface consumed by the HTTP
//! collaborator. Returns file paths; the HTTP layer streams bytes.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::analysis::AnalysisStore;
use crate::coordinator::BuildCoordinator;
use crate::error::{HlsError, Result};
use crate::probe::ProbeTool;
use crate::repository::MediaRepository;
use crate::types::{Analysis, MediaId, QualityLabel};

fn segment_filename_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^segment_(\d+)\.ts$").expect("valid pattern"))
}

pub struct StreamingFacade {
    analysis_store: AnalysisStore,
    coordinator: BuildCoordinator,
    repository: Arc<dyn MediaRepository>,
    probe: Arc<dyn ProbeTool>,
    target_segment_duration: f64,
}

impl StreamingFacade {
    pub fn new(
        coordinator: BuildCoordinator,
        repository: Arc<dyn MediaRepository>,
        probe: Arc<dyn ProbeTool>,
        target_segment_duration: f64,
    ) -> Self {
        Self {
            analysis_store: AnalysisStore::new(),
            coordinator,
            repository,
            probe,
            target_segment_duration,
        }
    }

    /// The underlying segment cache, exposed so collaborators can check
    /// whether a given response will be a cache hit before asking the
    /// facade to materialize it.
    pub fn cache(&self) -> &crate::cache::SegmentCache {
        self.coordinator.cache()
    }

    async fn analysis(&self, media_id: &MediaId) -> Result<Arc<Analysis>> {
        self.analysis_store
            .get_or_build(
                media_id,
                self.repository.as_ref(),
                self.probe.as_ref(),
                self.target_segment_duration,
            )
            .await
    }

    pub async fn get_master_playlist(&self, media_id: &MediaId) -> Result<PathBuf> {
        let analysis = self.analysis(media_id).await?;
        self.coordinator.ensure_master_playlist(media_id, &analysis).await
    }

    pub async fn get_variant_playlist(
        &self,
        media_id: &MediaId,
        quality: QualityLabel,
    ) -> Result<PathBuf> {
        let analysis = self.analysis(media_id).await?;
        if analysis.profile_for(quality).is_none() {
            return Err(HlsError::UnknownQuality(quality.to_string()));
        }
        self.coordinator
            .ensure_variant_playlist(media_id, &analysis, quality)
            .await
    }

    pub async fn get_segment(
        &self,
        media_id: &MediaId,
        quality: QualityLabel,
        filename: &str,
    ) -> Result<PathBuf> {
        let captures = segment_filename_pattern()
            .captures(filename)
            .ok_or_else(|| HlsError::InvalidSegmentName(filename.to_string()))?;
        let index: usize = captures[1]
            .parse()
            .map_err(|_| HlsError::InvalidSegmentName(filename.to_string()))?;

        let analysis = self.analysis(media_id).await?;
        if analysis.profile_for(quality).is_none() {
            return Err(HlsError::UnknownQuality(quality.to_string()));
        }
        if index >= analysis.segment_plan.len() {
            return Err(HlsError::InvalidSegmentName(format!(
                "segment index {index} out of range (plan has {})",
                analysis.segment_plan.len()
            )));
        }

        self.coordinator
            .ensure_segment(media_id, &analysis, quality, index)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_pattern_accepts_the_documented_shape() {
        let re = segment_filename_pattern();
        assert!(re.is_match("segment_000.ts"));
        assert!(re.is_match("segment_12345.ts"));
        assert!(!re.is_match("segment_abc.ts"));
        assert!(!re.is_match("segment_000.mp4"));
        assert!(!re.is_match("../segment_000.ts"));
    }
}
