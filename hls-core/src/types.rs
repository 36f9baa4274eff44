//! Core data model: the value types shared by every component.

use std::fmt;

/// Opaque external identifier for a piece of media; owned by the caller's
/// catalog, not interpreted here beyond what `MediaRepository` needs.
pub type MediaId = String;

/// A quality rendition label, drawn from a closed, fixed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QualityLabel {
    P2160,
    P1440,
    P1080,
    P720,
    P480,
    P360,
}

impl QualityLabel {
    /// All labels, ordered highest-quality first.
    pub const ALL: [QualityLabel; 6] = [
        QualityLabel::P2160,
        QualityLabel::P1440,
        QualityLabel::P1080,
        QualityLabel::P720,
        QualityLabel::P480,
        QualityLabel::P360,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            QualityLabel::P2160 => "2160p",
            QualityLabel::P1440 => "1440p",
            QualityLabel::P1080 => "1080p",
            QualityLabel::P720 => "720p",
            QualityLabel::P480 => "480p",
            QualityLabel::P360 => "360p",
        }
    }

    pub fn parse(s: &str) -> Option<QualityLabel> {
        Self::ALL.iter().copied().find(|l| l.as_str() == s)
    }
}

impl fmt::Display for QualityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable quality rendition profile, constructed by `ProfileSelector`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityProfile {
    pub label: QualityLabel,
    pub width: u32,
    pub height: u32,
    /// bits per second
    pub video_bitrate: u32,
    pub max_bitrate: u32,
    pub buffer_size: u32,
    pub audio_bitrate: u32,
}

/// A single keyframe: `(index, presentation_timestamp_seconds)`.
/// Monotonically increasing in both fields within a keyframe list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    pub index: usize,
    pub pts: f64,
}

/// One entry of the segment plan: `(index, start_pts, end_pts, duration)`
/// plus the keyframe indices and on-disk filename it corresponds to.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSpec {
    pub index: usize,
    pub start_pts: f64,
    pub end_pts: f64,
    pub start_keyframe_idx: usize,
    pub end_keyframe_idx: usize,
}

impl SegmentSpec {
    pub fn duration(&self) -> f64 {
        self.end_pts - self.start_pts
    }

    /// `segment_NNN.ts` using `digits` zero-padded width.
    pub fn filename(&self, digits: usize) -> String {
        format!("segment_{:0width$}.ts", self.index, width = digits)
    }
}

/// Everything known about one piece of media once analysis has run.
/// Immutable once built; lives for the process lifetime (§3 Lifecycles).
#[derive(Debug, Clone)]
pub struct Analysis {
    pub source_path: std::path::PathBuf,
    pub container_duration_seconds: f64,
    pub source_width: u32,
    pub source_height: u32,
    pub source_fps: f64,
    pub source_video_codec: String,
    pub source_audio_codec: Option<String>,
    pub keyframes: Vec<Keyframe>,
    pub eligible_profiles: Vec<QualityProfile>,
    pub segment_plan: Vec<SegmentSpec>,
}

impl Analysis {
    pub fn profile_for(&self, label: QualityLabel) -> Option<&QualityProfile> {
        self.eligible_profiles.iter().find(|p| p.label == label)
    }
}

/// Result of `ProbeFormat`.
#[derive(Debug, Clone)]
pub struct ProbedFormat {
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub video_codec: String,
    pub audio_codec: Option<String>,
    pub bitrate: Option<u64>,
}
