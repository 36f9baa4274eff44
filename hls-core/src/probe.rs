//! `ProbeTool` (§4.1): wraps the external probe binary (ffprobe-compatible)
//! to extract container/stream metadata and the keyframe timestamp list.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::error::{HlsError, ProbeError, Result};
use crate::types::{Keyframe, ProbedFormat};

const FORMAT_TIMEOUT: Duration = Duration::from_secs(30);
const KEYFRAMES_TIMEOUT: Duration = Duration::from_secs(60);
const FORMAT_BUFFER_LIMIT: usize = 1024 * 1024;
const KEYFRAMES_BUFFER_LIMIT: usize = 10 * 1024 * 1024;
const DEFAULT_FPS: f64 = 24.0;

#[async_trait]
pub trait ProbeTool: Send + Sync {
    async fn probe_format(&self, path: &Path) -> Result<ProbedFormat>;
    async fn probe_keyframes(&self, path: &Path) -> Result<Vec<Keyframe>>;
}

/// Spawns `probe_binary_path` (an ffprobe-compatible binary) as a child
/// process for every call. Both operations are read-only and idempotent.
pub struct FfprobeTool {
    binary_path: PathBuf,
}

impl FfprobeTool {
    pub fn new(binary_path: impl Into<PathBuf>) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    fn validate_path(path: &Path) -> Result<()> {
        if !path.is_absolute() {
            return Err(HlsError::InvalidPath(format!(
                "path must be absolute: {}",
                path.display()
            )));
        }
        let s = path.to_string_lossy();
        if s.contains('\0') {
            return Err(HlsError::InvalidPath("path contains a NUL byte".into()));
        }
        if path
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(HlsError::InvalidPath(
                "path contains a parent-traversal component".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    streams: Vec<FfprobeStream>,
}

#[derive(Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
}

fn parse_frame_rate(s: &str) -> f64 {
    let mut parts = s.split('/');
    match (parts.next(), parts.next()) {
        (Some(num), Some(den)) => {
            let num: f64 = num.parse().unwrap_or(0.0);
            let den: f64 = den.parse().unwrap_or(0.0);
            if den > 0.0 {
                num / den
            } else {
                DEFAULT_FPS
            }
        }
        _ => DEFAULT_FPS,
    }
}

#[async_trait]
impl ProbeTool for FfprobeTool {
    async fn probe_format(&self, path: &Path) -> Result<ProbedFormat> {
        Self::validate_path(path)?;

        let mut cmd = Command::new(&self.binary_path);
        cmd.args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

        let stdout = run_bounded(cmd, FORMAT_TIMEOUT, FORMAT_BUFFER_LIMIT).await?;

        let parsed: FfprobeOutput = serde_json::from_slice(&stdout)
            .map_err(|e| ProbeError::Parse(e.to_string()))?;

        let video = parsed
            .streams
            .iter()
            .find(|s| s.codec_type == "video")
            .ok_or_else(|| ProbeError::Parse("no video stream in probe output".into()))?;
        let audio = parsed.streams.iter().find(|s| s.codec_type == "audio");

        let duration: f64 = parsed
            .format
            .duration
            .as_deref()
            .and_then(|d| d.parse().ok())
            .ok_or_else(|| ProbeError::Parse("missing container duration".into()))?;

        Ok(ProbedFormat {
            duration,
            width: video.width.unwrap_or(0),
            height: video.height.unwrap_or(0),
            fps: video
                .r_frame_rate
                .as_deref()
                .map(parse_frame_rate)
                .unwrap_or(DEFAULT_FPS),
            video_codec: video.codec_name.clone().unwrap_or_else(|| "unknown".into()),
            audio_codec: audio.and_then(|a| a.codec_name.clone()),
            bitrate: parsed.format.bit_rate.as_deref().and_then(|b| b.parse().ok()),
        })
    }

    async fn probe_keyframes(&self, path: &Path) -> Result<Vec<Keyframe>> {
        Self::validate_path(path)?;

        let mut cmd = Command::new(&self.binary_path);
        cmd.args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "packet=pts_time,flags",
            "-of",
            "csv=print_section=0",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

        let stdout = run_bounded(cmd, KEYFRAMES_TIMEOUT, KEYFRAMES_BUFFER_LIMIT).await?;
        let text = String::from_utf8_lossy(&stdout);

        let mut keyframes = Vec::new();
        for line in text.lines() {
            let mut fields = line.splitn(2, ',');
            let (Some(pts_time), Some(flags)) = (fields.next(), fields.next()) else {
                continue;
            };
            if !flags.contains('K') {
                continue;
            }
            let Ok(pts) = pts_time.parse::<f64>() else {
                continue;
            };
            keyframes.push(Keyframe {
                index: keyframes.len(),
                pts,
            });
        }

        if keyframes.is_empty() {
            return Err(HlsError::Probe(ProbeError::NoKeyframes));
        }
        Ok(keyframes)
    }
}

/// Spawns `cmd`, enforces `timeout`, and reads stdout up to `limit` bytes.
/// Exceeding the limit or the timeout kills the child and surfaces the
/// appropriate `ProbeError`.
async fn run_bounded(mut cmd: Command, timeout: Duration, limit: usize) -> Result<Vec<u8>> {
    let mut child = cmd.spawn().map_err(|e| ProbeError::Spawn(e.to_string()))?;
    let mut stdout = child.stdout.take().expect("stdout piped");
    let mut stderr = child.stderr.take().expect("stderr piped");

    let read_fut = async {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            let n = stdout
                .read(&mut chunk)
                .await
                .map_err(|e| ProbeError::Spawn(e.to_string()))?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if buf.len() > limit {
                return Err(ProbeError::BufferOverflow { limit });
            }
        }
        Ok(buf)
    };

    let stderr_fut = async {
        let mut buf = Vec::new();
        let _ = stderr.read_to_end(&mut buf).await;
        buf
    };

    let result = tokio::time::timeout(timeout, async { (read_fut.await, stderr_fut.await) }).await;

    let (read_result, stderr_buf) = match result {
        Ok(pair) => pair,
        Err(_) => {
            let _ = child.kill().await;
            return Err(HlsError::Probe(ProbeError::Timeout(timeout)));
        }
    };

    let status = child
        .wait()
        .await
        .map_err(|e| ProbeError::Spawn(e.to_string()))?;

    let stdout_buf = read_result.map_err(HlsError::Probe)?;

    if !status.success() {
        let stderr_tail = tail_of(&stderr_buf, 4096);
        return Err(HlsError::Probe(ProbeError::ExitStatus {
            code: status.code(),
            stderr_tail,
        }));
    }

    Ok(stdout_buf)
}

fn tail_of(bytes: &[u8], max: usize) -> String {
    let start = bytes.len().saturating_sub(max);
    String::from_utf8_lossy(&bytes[start..]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_frame_rates() {
        assert_eq!(parse_frame_rate("30000/1001"), 30000.0 / 1001.0);
        assert_eq!(parse_frame_rate("25/1"), 25.0);
    }

    #[test]
    fn missing_frame_rate_defaults_to_24() {
        assert_eq!(parse_frame_rate("0/0"), DEFAULT_FPS);
    }

    #[test]
    fn rejects_relative_paths() {
        let err = FfprobeTool::validate_path(Path::new("relative/movie.mp4")).unwrap_err();
        assert!(matches!(err, HlsError::InvalidPath(_)));
    }

    #[test]
    fn rejects_parent_traversal() {
        let err = FfprobeTool::validate_path(Path::new("/media/../etc/passwd")).unwrap_err();
        assert!(matches!(err, HlsError::InvalidPath(_)));
    }

    #[test]
    fn accepts_clean_absolute_paths() {
        FfprobeTool::validate_path(Path::new("/media/movie.mp4")).unwrap();
    }
}
