//! `EncoderTool` (§4.8): wraps the external encoder binary (ffmpeg-
//! compatible) to transcode one segment's time range to MPEG-TS.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::error::{EncoderError, HlsError, Result};
use crate::types::QualityProfile;

/// Everything `EncodeSegment` needs that isn't already implied by the
/// profile or the registry: the source, the time range, and the context
/// (fps, target duration) needed to derive GOP size and keyframe forcing.
pub struct EncodeRequest<'a> {
    pub source_path: &'a Path,
    pub seek_pts: f64,
    pub duration: f64,
    pub profile: &'a QualityProfile,
    pub source_width: u32,
    pub source_height: u32,
    pub source_fps: f64,
    pub target_segment_duration: f64,
    pub has_audio: bool,
    pub out_path_tmp: &'a Path,
}

#[async_trait]
pub trait EncoderTool: Send + Sync {
    async fn encode_segment(&self, req: EncodeRequest<'_>) -> Result<()>;
}

/// Tracks live encoder child PIDs so the application's shutdown hook can
/// terminate them; drained with a SIGTERM-then-SIGKILL grace period.
#[derive(Default, Clone)]
pub struct SubprocessRegistry {
    inner: Arc<PidSet>,
}

#[derive(Default)]
struct PidSet(std::sync::Mutex<std::collections::HashSet<u32>>);

impl PidSet {
    fn insert(&self, pid: u32) {
        self.0.lock().unwrap().insert(pid);
    }
    fn remove(&self, pid: u32) {
        self.0.lock().unwrap().remove(&pid);
    }
    fn snapshot(&self) -> Vec<u32> {
        self.0.lock().unwrap().iter().copied().collect()
    }
}

impl SubprocessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn track(&self, pid: u32) {
        self.inner.insert(pid);
    }

    fn untrack(&self, pid: u32) {
        self.inner.remove(pid);
    }

    /// Best-effort SIGTERM to every tracked child, then SIGKILL to
    /// survivors after `grace`.
    pub async fn drain(&self, grace: Duration) {
        let pids = self.inner.snapshot();
        if pids.is_empty() {
            return;
        }
        tracing::info!(count = pids.len(), "terminating tracked encoder subprocesses");
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;
            for &pid in &pids {
                let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
            }
            tokio::time::sleep(grace).await;
            for &pid in &pids {
                let _ = kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
            }
        }
        #[cfg(not(unix))]
        {
            let _ = grace;
        }
    }
}

/// Spawns `encoder_binary_path` per segment request, following the
/// argument contract in §4.8: seek before `-i`, libx264 main@4.0
/// yuv420p, veryfast/zerolatency, keyframe-forced GOP sized to the
/// target segment duration, AAC audio (or generated silence), MPEG-TS
/// output.
pub struct FfmpegEncoderTool {
    binary_path: PathBuf,
    registry: SubprocessRegistry,
    concurrency: Arc<tokio::sync::Semaphore>,
}

impl FfmpegEncoderTool {
    /// `max_concurrent_encodes` bounds how many encoder subprocesses may
    /// run at once; queued requests simply wait, with no ordering
    /// guarantee among them (§5).
    pub fn new(
        binary_path: impl Into<PathBuf>,
        registry: SubprocessRegistry,
        max_concurrent_encodes: usize,
    ) -> Self {
        Self {
            binary_path: binary_path.into(),
            registry,
            concurrency: Arc::new(tokio::sync::Semaphore::new(max_concurrent_encodes.max(1))),
        }
    }

    fn build_args(req: &EncodeRequest<'_>) -> Vec<String> {
        let gop = (req.source_fps * req.target_segment_duration).round() as i64;
        let gop = gop.max(1);

        let mut args: Vec<String> = vec![
            "-y".into(),
            "-ss".into(),
            format!("{:.6}", req.seek_pts),
            "-i".into(),
            req.source_path.to_string_lossy().into_owned(),
        ];

        // Both inputs (real or synthetic) are opened before `-t` is
        // appended below, so `-t` always lands as an output option
        // bounding the muxed result, never as an input option that
        // would instead cap whichever `-i` happens to follow it.
        if req.has_audio {
            args.push("-map".into());
            args.push("0:v:0".into());
            args.push("-map".into());
            args.push("0:a:0".into());
        } else {
            args.push("-f".into());
            args.push("lavfi".into());
            args.push("-i".into());
            args.push("anullsrc=channel_layout=stereo:sample_rate=48000".into());
            args.push("-map".into());
            args.push("0:v:0".into());
            args.push("-map".into());
            args.push("1:a:0".into());
            args.push("-shortest".into());
        }

        args.push("-t".into());
        args.push(format!("{:.6}", req.duration));

        args.extend([
            "-c:v".into(),
            "libx264".into(),
            "-profile:v".into(),
            "main".into(),
            "-level".into(),
            "4.0".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-preset".into(),
            "veryfast".into(),
            "-tune".into(),
            "zerolatency".into(),
            "-sc_threshold".into(),
            "0".into(),
            "-g".into(),
            gop.to_string(),
            "-keyint_min".into(),
            gop.to_string(),
            "-force_key_frames".into(),
            format!("expr:gte(t,n_forced*{})", req.target_segment_duration),
            "-b:v".into(),
            req.profile.video_bitrate.to_string(),
            "-maxrate".into(),
            req.profile.max_bitrate.to_string(),
            "-bufsize".into(),
            req.profile.buffer_size.to_string(),
        ]);

        if req.source_width != req.profile.width || req.source_height != req.profile.height {
            args.push("-vf".into());
            args.push(format!(
                "scale={}:{}:flags=lanczos",
                req.profile.width, req.profile.height
            ));
        }

        args.extend([
            "-c:a".into(),
            "aac".into(),
            "-ar".into(),
            "48000".into(),
            "-ac".into(),
            "2".into(),
            "-b:a".into(),
            req.profile.audio_bitrate.to_string(),
            "-err_detect".into(),
            "ignore_err".into(),
            "-fflags".into(),
            "+genpts".into(),
            "-f".into(),
            "mpegts".into(),
            req.out_path_tmp.to_string_lossy().into_owned(),
        ]);

        args
    }
}

#[async_trait]
impl EncoderTool for FfmpegEncoderTool {
    async fn encode_segment(&self, req: EncodeRequest<'_>) -> Result<()> {
        let timeout = Duration::from_secs_f64((10.0 * req.duration).max(30.0));
        let args = Self::build_args(&req);

        let _permit = self
            .concurrency
            .acquire()
            .await
            .expect("semaphore is never closed");

        let mut cmd = Command::new(&self.binary_path);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| HlsError::Encoder(EncoderError::Spawn(e.to_string())))?;

        let pid = child.id();
        if let Some(pid) = pid {
            self.registry.track(pid);
        }

        let mut stderr = child.stderr.take().expect("stderr piped");
        let run = async {
            let mut stderr_buf = Vec::new();
            let _ = stderr.read_to_end(&mut stderr_buf).await;
            let status = child.wait().await;
            (status, stderr_buf)
        };

        let outcome = tokio::time::timeout(timeout, run).await;

        if let Some(pid) = pid {
            self.registry.untrack(pid);
        }

        let (status, stderr_buf) = match outcome {
            Ok(pair) => pair,
            Err(_) => {
                let _ = child.kill().await;
                return Err(HlsError::Encoder(EncoderError::Timeout(timeout)));
            }
        };

        let status = status.map_err(|e| HlsError::Encoder(EncoderError::Spawn(e.to_string())))?;

        if !status.success() {
            let stderr_tail = tail_of(&stderr_buf, 4096);
            return Err(HlsError::Encoder(EncoderError::ExitStatus {
                code: status.code(),
                stderr_tail,
            }));
        }

        Ok(())
    }
}

fn tail_of(bytes: &[u8], max: usize) -> String {
    let start = bytes.len().saturating_sub(max);
    String::from_utf8_lossy(&bytes[start..]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{QualityLabel, QualityProfile};

    fn profile() -> QualityProfile {
        QualityProfile {
            label: QualityLabel::P720,
            width: 1280,
            height: 720,
            video_bitrate: 3_000_000,
            max_bitrate: 3_500_000,
            buffer_size: 6_000_000,
            audio_bitrate: 128_000,
        }
    }

    #[test]
    fn seeks_before_input_and_clamps_duration() {
        let profile = profile();
        let req = EncodeRequest {
            source_path: Path::new("/media/movie.mp4"),
            seek_pts: 12.0,
            duration: 6.0,
            profile: &profile,
            source_width: 1920,
            source_height: 1080,
            source_fps: 30.0,
            target_segment_duration: 6.0,
            has_audio: true,
            out_path_tmp: Path::new("/cache/m/720p/segment_002.ts.tmp"),
        };
        let args = FfmpegEncoderTool::build_args(&req);
        let ss_idx = args.iter().position(|a| a == "-ss").unwrap();
        let i_idx = args.iter().position(|a| a == "-i").unwrap();
        assert!(ss_idx < i_idx, "seek flag must precede -i");
        assert_eq!(args[ss_idx + 1], "12.000000");
        let t_idx = args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[t_idx + 1], "6.000000");
    }

    #[test]
    fn gop_matches_fps_times_target_duration() {
        let profile = profile();
        let req = EncodeRequest {
            source_path: Path::new("/media/movie.mp4"),
            seek_pts: 0.0,
            duration: 6.0,
            profile: &profile,
            source_width: 1280,
            source_height: 720,
            source_fps: 30.0,
            target_segment_duration: 6.0,
            has_audio: true,
            out_path_tmp: Path::new("/cache/m/720p/segment_000.ts.tmp"),
        };
        let args = FfmpegEncoderTool::build_args(&req);
        let g_idx = args.iter().position(|a| a == "-g").unwrap();
        assert_eq!(args[g_idx + 1], "180");
    }

    #[test]
    fn matching_resolution_skips_scale_filter() {
        let profile = profile();
        let req = EncodeRequest {
            source_path: Path::new("/media/movie.mp4"),
            seek_pts: 0.0,
            duration: 6.0,
            profile: &profile,
            source_width: 1280,
            source_height: 720,
            source_fps: 30.0,
            target_segment_duration: 6.0,
            has_audio: true,
            out_path_tmp: Path::new("/cache/m/720p/segment_000.ts.tmp"),
        };
        let args = FfmpegEncoderTool::build_args(&req);
        assert!(!args.iter().any(|a| a == "-vf"));
    }

    #[test]
    fn mismatched_resolution_scales_with_lanczos() {
        let profile = profile();
        let req = EncodeRequest {
            source_path: Path::new("/media/movie.mp4"),
            seek_pts: 0.0,
            duration: 6.0,
            profile: &profile,
            source_width: 1920,
            source_height: 1080,
            source_fps: 30.0,
            target_segment_duration: 6.0,
            has_audio: true,
            out_path_tmp: Path::new("/cache/m/720p/segment_000.ts.tmp"),
        };
        let args = FfmpegEncoderTool::build_args(&req);
        let vf_idx = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(args[vf_idx + 1], "scale=1280:720:flags=lanczos");
    }

    #[test]
    fn missing_audio_generates_silence() {
        let profile = profile();
        let req = EncodeRequest {
            source_path: Path::new("/media/movie.mp4"),
            seek_pts: 0.0,
            duration: 6.0,
            profile: &profile,
            source_width: 1280,
            source_height: 720,
            source_fps: 30.0,
            target_segment_duration: 6.0,
            has_audio: false,
            out_path_tmp: Path::new("/cache/m/720p/segment_000.ts.tmp"),
        };
        let args = FfmpegEncoderTool::build_args(&req);
        assert!(args.iter().any(|a| a == "anullsrc=channel_layout=stereo:sample_rate=48000"));
    }

    #[test]
    fn missing_audio_branch_applies_t_as_an_output_option_after_both_inputs() {
        let profile = profile();
        let req = EncodeRequest {
            source_path: Path::new("/media/movie.mp4"),
            seek_pts: 0.0,
            duration: 6.0,
            profile: &profile,
            source_width: 1280,
            source_height: 720,
            source_fps: 30.0,
            target_segment_duration: 6.0,
            has_audio: false,
            out_path_tmp: Path::new("/cache/m/720p/segment_000.ts.tmp"),
        };
        let args = FfmpegEncoderTool::build_args(&req);
        let i_positions: Vec<_> = args.iter().enumerate().filter(|(_, a)| *a == "-i").map(|(i, _)| i).collect();
        assert_eq!(i_positions.len(), 2, "expects the source input and the synthetic silence input");
        let t_idx = args.iter().position(|a| a == "-t").unwrap();
        assert!(
            t_idx > i_positions[1],
            "-t must follow both -i flags so it bounds the output, not the upcoming silence input"
        );
        assert_eq!(args[t_idx + 1], "6.000000");
    }
}
