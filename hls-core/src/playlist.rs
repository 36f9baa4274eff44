//! Master and variant playlist rendering (§4.6).

use crate::planner::generate_hls_entries;
use crate::types::{Analysis, QualityLabel, QualityProfile};

/// `#EXT-X-STREAM-INF` lines, highest quality first, one per eligible
/// profile. `BANDWIDTH` is the profile's max video bitrate plus its
/// audio bitrate, in bits per second.
pub fn render_master(analysis: &Analysis) -> String {
    let mut out = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");
    for profile in &analysis.eligible_profiles {
        out.push_str(&render_stream_inf(profile));
    }
    out
}

fn render_stream_inf(profile: &QualityProfile) -> String {
    let bandwidth = profile.max_bitrate + profile.audio_bitrate;
    format!(
        "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}x{},CODECS=\"avc1.4d401f,mp4a.40.2\"\n{}/playlist.m3u8\n",
        bandwidth, profile.width, profile.height, profile.label.as_str()
    )
}

/// A VOD variant playlist: fixed target duration, sequence 0, one
/// `#EXTINF`/filename pair per planned segment, closed with
/// `#EXT-X-ENDLIST`.
pub fn render_variant(analysis: &Analysis, digits: usize) -> String {
    let target_duration = analysis
        .segment_plan
        .iter()
        .map(|s| s.duration())
        .fold(0.0f64, f64::max)
        .ceil() as i64;

    let mut out = format!(
        "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:{}\n#EXT-X-MEDIA-SEQUENCE:0\n#EXT-X-PLAYLIST-TYPE:VOD\n",
        target_duration.max(1)
    );
    out.push_str(&generate_hls_entries(&analysis.segment_plan, digits));
    out.push_str("#EXT-X-ENDLIST\n");
    out
}
