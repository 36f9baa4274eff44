//! Segment boundary planning (§4.2). Pure, deterministic: the same
//! `(keyframes, target_segment_duration, total_duration)` triple always
//! produces byte-identical output.

use crate::error::{HlsError, Result};
use crate::types::{Keyframe, SegmentSpec};

/// Minimum duration a segment may have before its tail is absorbed into
/// the preceding one. See the Design Notes: this spec chooses absorption
/// over emitting a sub-threshold final segment.
const MIN_SEGMENT_DURATION: f64 = 0.5;

/// Builds the ordered segment plan from a keyframe list.
///
/// Walks the keyframe list with a moving cursor: each iteration finds the
/// earliest keyframe at or after the cursor (the segment start) and the
/// earliest keyframe at or after `cursor + target_segment_duration` (the
/// next segment's start, and therefore this segment's end). When no such
/// keyframe exists, or it coincides with the start, the plan closes out
/// with the container's total duration instead.
pub fn build_segment_plan(
    keyframes: &[Keyframe],
    target_segment_duration: f64,
    total_duration: f64,
) -> Result<Vec<SegmentSpec>> {
    if keyframes.is_empty() {
        return Err(HlsError::PlanInvariantViolation(
            "cannot plan segments with no keyframes".into(),
        ));
    }

    let mut plan = Vec::new();
    let mut cursor = 0.0f64;
    let mut index = 0usize;

    while cursor < total_duration {
        let Some(start_kf) = earliest_keyframe_at_or_after(keyframes, cursor) else {
            break;
        };

        let end_kf = earliest_keyframe_at_or_after(keyframes, cursor + target_segment_duration);

        let end_pts = match end_kf {
            Some(kf) if kf.index != start_kf.index => kf.pts,
            _ => total_duration,
        };

        let duration = end_pts - start_kf.pts;
        if duration < MIN_SEGMENT_DURATION {
            tracing::debug!(
                cursor,
                duration,
                "absorbing sub-threshold tail segment into predecessor"
            );
            cursor = end_pts;
            continue;
        }

        plan.push(SegmentSpec {
            index,
            start_pts: start_kf.pts,
            end_pts,
            start_keyframe_idx: start_kf.index,
            end_keyframe_idx: end_kf.map(|k| k.index).unwrap_or(start_kf.index),
        });
        index += 1;
        cursor = end_pts;
    }

    assert_continuity(&plan, keyframes, total_duration)?;
    Ok(plan)
}

/// Earliest keyframe with `pts >= at`. Ties (equal `pts`) resolve to the
/// lowest index, which is automatically satisfied by scanning in order.
fn earliest_keyframe_at_or_after(keyframes: &[Keyframe], at: f64) -> Option<Keyframe> {
    keyframes.iter().copied().find(|kf| kf.pts >= at)
}

fn assert_continuity(
    plan: &[SegmentSpec],
    keyframes: &[Keyframe],
    total_duration: f64,
) -> Result<()> {
    let Some(first) = plan.first() else {
        return Err(HlsError::PlanInvariantViolation(
            "segment plan is empty".into(),
        ));
    };
    if (first.start_pts - keyframes[0].pts).abs() > 1e-6 {
        return Err(HlsError::PlanInvariantViolation(
            "first segment does not start on the first keyframe".into(),
        ));
    }
    for pair in plan.windows(2) {
        let gap = (pair[0].end_pts - pair[1].start_pts).abs();
        if gap > 0.1 {
            return Err(HlsError::PlanInvariantViolation(format!(
                "gap/overlap of {gap:.3}s between segments {} and {}",
                pair[0].index, pair[1].index
            )));
        }
    }
    let last = plan.last().expect("checked non-empty above");
    if (last.end_pts - total_duration).abs() > 1e-6 {
        return Err(HlsError::PlanInvariantViolation(format!(
            "final segment ends at {:.3}, expected {:.3}",
            last.end_pts, total_duration
        )));
    }
    for spec in plan {
        if spec.duration() < MIN_SEGMENT_DURATION - 1e-9 {
            return Err(HlsError::PlanInvariantViolation(format!(
                "segment {} has duration {:.3} below the minimum",
                spec.index,
                spec.duration()
            )));
        }
    }
    Ok(())
}

/// Binary-search the plan for the segment with this exact index.
pub fn find_segment_by_index(plan: &[SegmentSpec], index: usize) -> Option<&SegmentSpec> {
    plan.get(index).filter(|s| s.index == index)
}

/// The segment `s` such that `s.start_pts <= t < s.end_pts`.
pub fn find_segment_at_time(plan: &[SegmentSpec], t: f64) -> Option<&SegmentSpec> {
    plan.iter().find(|s| s.start_pts <= t && t < s.end_pts)
}

/// Renders the `#EXTINF` lines used by the variant playlist, one pair per
/// segment: `#EXTINF:<duration.3f>,\n<filename>`.
pub fn generate_hls_entries(plan: &[SegmentSpec], digits: usize) -> String {
    let mut out = String::new();
    for spec in plan {
        out.push_str(&format!(
            "#EXTINF:{:.3},\n{}\n",
            spec.duration(),
            spec.filename(digits)
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kf(index: usize, pts: f64) -> Keyframe {
        Keyframe { index, pts }
    }

    #[test]
    fn scenario_a_plan_shape() {
        let keyframes = vec![kf(0, 0.0), kf(1, 6.0), kf(2, 12.0), kf(3, 18.0)];
        let plan = build_segment_plan(&keyframes, 6.0, 20.0).unwrap();
        let shape: Vec<_> = plan.iter().map(|s| (s.index, s.start_pts, s.end_pts)).collect();
        assert_eq!(
            shape,
            vec![
                (0, 0.0, 6.0),
                (1, 6.0, 12.0),
                (2, 12.0, 18.0),
                (3, 18.0, 20.0)
            ]
        );
    }

    #[test]
    fn scenario_b_non_aligned_keyframes() {
        let keyframes = vec![kf(0, 0.0), kf(1, 5.8), kf(2, 11.9)];
        let plan = build_segment_plan(&keyframes, 6.0, 15.0).unwrap();
        let shape: Vec<_> = plan.iter().map(|s| (s.index, s.start_pts, s.end_pts)).collect();
        assert_eq!(shape, vec![(0, 0.0, 5.8), (1, 5.8, 11.9), (2, 11.9, 15.0)]);
    }

    #[test]
    fn scenario_c_tiny_tail_absorbed() {
        let keyframes = vec![kf(0, 0.0), kf(1, 6.0)];
        let plan = build_segment_plan(&keyframes, 6.0, 6.2).unwrap();
        let shape: Vec<_> = plan.iter().map(|s| (s.index, s.start_pts, s.end_pts)).collect();
        assert_eq!(shape, vec![(0, 0.0, 6.2)]);
    }

    #[test]
    fn source_shorter_than_target_yields_one_segment() {
        let keyframes = vec![kf(0, 0.0)];
        let plan = build_segment_plan(&keyframes, 6.0, 3.0).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].duration(), 3.0);
    }

    #[test]
    fn single_keyframe_at_zero_yields_one_segment() {
        let keyframes = vec![kf(0, 0.0)];
        let plan = build_segment_plan(&keyframes, 6.0, 20.0).unwrap();
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn plan_is_deterministic() {
        let keyframes = vec![kf(0, 0.0), kf(1, 6.1), kf(2, 12.4), kf(3, 19.0)];
        let a = build_segment_plan(&keyframes, 6.0, 24.0).unwrap();
        let b = build_segment_plan(&keyframes, 6.0, 24.0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn extinf_count_matches_plan_length_and_duration_sums_match() {
        let keyframes = vec![kf(0, 0.0), kf(1, 6.0), kf(2, 12.0), kf(3, 18.0)];
        let plan = build_segment_plan(&keyframes, 6.0, 20.0).unwrap();
        let rendered = generate_hls_entries(&plan, 3);
        assert_eq!(rendered.matches("#EXTINF").count(), plan.len());
        let sum: f64 = plan.iter().map(|s| s.duration()).sum();
        assert!((sum - 20.0).abs() < 0.001);
    }

    #[test]
    fn filename_round_trips_for_configured_digit_width() {
        let spec = SegmentSpec {
            index: 42,
            start_pts: 0.0,
            end_pts: 6.0,
            start_keyframe_idx: 0,
            end_keyframe_idx: 1,
        };
        assert_eq!(spec.filename(3), "segment_042.ts");
        assert_eq!(spec.filename(4), "segment_0042.ts");
    }
}
