//! Quality ladder selection (§4.3). Pure, deterministic, no I/O.

use crate::types::{QualityLabel, QualityProfile};

/// Fixed bitrate table for the quality ladder. Part of the contract, not
/// tunable per-request.
const LADDER: &[QualityProfile] = &[
    QualityProfile {
        label: QualityLabel::P2160,
        width: 3840,
        height: 2160,
        video_bitrate: 12_000_000,
        max_bitrate: 14_000_000,
        buffer_size: 24_000_000,
        audio_bitrate: 192_000,
    },
    QualityProfile {
        label: QualityLabel::P1440,
        width: 2560,
        height: 1440,
        video_bitrate: 8_000_000,
        max_bitrate: 9_500_000,
        buffer_size: 16_000_000,
        audio_bitrate: 192_000,
    },
    QualityProfile {
        label: QualityLabel::P1080,
        width: 1920,
        height: 1080,
        video_bitrate: 5_000_000,
        max_bitrate: 6_000_000,
        buffer_size: 10_000_000,
        audio_bitrate: 128_000,
    },
    QualityProfile {
        label: QualityLabel::P720,
        width: 1280,
        height: 720,
        video_bitrate: 3_000_000,
        max_bitrate: 3_500_000,
        buffer_size: 6_000_000,
        audio_bitrate: 128_000,
    },
    QualityProfile {
        label: QualityLabel::P480,
        width: 854,
        height: 480,
        video_bitrate: 1_500_000,
        max_bitrate: 1_800_000,
        buffer_size: 3_000_000,
        audio_bitrate: 96_000,
    },
    QualityProfile {
        label: QualityLabel::P360,
        width: 640,
        height: 360,
        video_bitrate: 800_000,
        max_bitrate: 1_000_000,
        buffer_size: 1_600_000,
        audio_bitrate: 96_000,
    },
];

/// Returns the eligible profiles for a source of the given resolution,
/// ordered highest-quality first. A profile is eligible iff its height is
/// at most the source height; if none qualify (source smaller than the
/// smallest rung), the single smallest profile is returned so every
/// source gets at least one playable rendition.
pub fn select_profiles(source_width: u32, source_height: u32) -> Vec<QualityProfile> {
    let _ = source_width;
    let eligible: Vec<QualityProfile> = LADDER
        .iter()
        .copied()
        .filter(|p| p.height <= source_height)
        .collect();

    if eligible.is_empty() {
        vec![*LADDER.last().expect("ladder is non-empty")]
    } else {
        eligible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_hd_source_gets_four_renditions() {
        let profiles = select_profiles(1920, 1080);
        let labels: Vec<_> = profiles.iter().map(|p| p.label).collect();
        assert_eq!(
            labels,
            vec![
                QualityLabel::P1080,
                QualityLabel::P720,
                QualityLabel::P480,
                QualityLabel::P360
            ]
        );
    }

    #[test]
    fn tiny_source_falls_back_to_smallest_rung() {
        let profiles = select_profiles(640, 360);
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].label, QualityLabel::P360);
    }

    #[test]
    fn below_smallest_rung_still_returns_smallest() {
        let profiles = select_profiles(320, 180);
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].label, QualityLabel::P360);
    }

    #[test]
    fn eligibility_never_exceeds_source_height() {
        for &(w, h) in &[(3840u32, 2160u32), (2560, 1440), (1280, 720)] {
            for p in select_profiles(w, h) {
                assert!(p.height <= h);
            }
        }
    }
}
