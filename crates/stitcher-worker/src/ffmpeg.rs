// FFmpeg/FFprobe media engine
//
// All codec work is delegated to the ffmpeg and ffprobe binaries as child
// processes. The `MediaEngine` trait is the seam that lets pipeline tests
// run without either binary installed.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use crate::audio::{build_mix_args, MixJob};
use crate::normalize::TargetProfile;

/// Error type for ffmpeg/ffprobe operations
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("ffmpeg/ffprobe binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffmpeg/ffprobe execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse ffprobe output: {0}")]
    Parse(String),

    #[error("input file not found: {0}")]
    InputMissing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stream-level facts the pipeline needs about a media file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaInfo {
    /// Container duration in seconds
    pub duration: f64,
    pub has_audio: bool,
    pub width: i64,
    pub height: i64,
}

/// Media operations used by the pipeline stages
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Probe duration, resolution, and audio presence
    async fn probe(&self, path: &Path) -> Result<MediaInfo, MediaError>;

    /// Re-encode one clip to the shared target profile
    async fn normalize(
        &self,
        input: &Path,
        output: &Path,
        profile: &TargetProfile,
    ) -> Result<(), MediaError>;

    /// Join segments listed in a concat-demuxer manifest by stream copy
    async fn concat(&self, manifest: &Path, output: &Path) -> Result<(), MediaError>;

    /// Apply an audio mix job (video stream copied, audio rebuilt)
    async fn mix(&self, job: &MixJob) -> Result<(), MediaError>;
}

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<i64>,
    height: Option<i64>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

// ---------------------------------------------------------------------------
// FfmpegEngine
// ---------------------------------------------------------------------------

/// Production engine shelling out to ffmpeg/ffprobe
#[derive(Debug, Default, Clone)]
pub struct FfmpegEngine;

impl FfmpegEngine {
    pub fn new() -> Self {
        Self
    }

    async fn run_ffmpeg(&self, args: &[String]) -> Result<(), MediaError> {
        debug!(args = ?args, "Running ffmpeg");
        let output = tokio::process::Command::new("ffmpeg")
            .args(args)
            .output()
            .await
            .map_err(MediaError::NotFound)?;

        if !output.status.success() {
            return Err(MediaError::ExecutionFailed {
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn probe(&self, path: &Path) -> Result<MediaInfo, MediaError> {
        if !path.exists() {
            return Err(MediaError::InputMissing(path.to_string_lossy().to_string()));
        }

        let output = tokio::process::Command::new("ffprobe")
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .output()
            .await
            .map_err(MediaError::NotFound)?;

        if !output.status.success() {
            return Err(MediaError::ExecutionFailed {
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let probe: FfprobeOutput =
            serde_json::from_str(&stdout).map_err(|e| MediaError::Parse(format!("{e}: {stdout}")))?;

        let video = probe
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"));
        let has_audio = probe
            .streams
            .iter()
            .any(|s| s.codec_type.as_deref() == Some("audio"));

        let duration = probe
            .format
            .duration
            .as_deref()
            .or_else(|| video.and_then(|v| v.duration.as_deref()))
            .and_then(|d| d.parse::<f64>().ok())
            .ok_or_else(|| MediaError::Parse("no duration in ffprobe output".to_string()))?;

        Ok(MediaInfo {
            duration,
            has_audio,
            width: video.and_then(|v| v.width).unwrap_or(0),
            height: video.and_then(|v| v.height).unwrap_or(0),
        })
    }

    async fn normalize(
        &self,
        input: &Path,
        output: &Path,
        profile: &TargetProfile,
    ) -> Result<(), MediaError> {
        let info = self.probe(input).await?;
        let args = crate::normalize::build_normalize_args(input, output, profile, &info);
        self.run_ffmpeg(&args).await
    }

    async fn concat(&self, manifest: &Path, output: &Path) -> Result<(), MediaError> {
        // Stream copy: normalization already guaranteed identical container
        // parameters, so no re-encode happens at join time.
        let args: Vec<String> = [
            "-y",
            "-f",
            "concat",
            "-safe",
            "0",
            "-i",
            &manifest.to_string_lossy(),
            "-c",
            "copy",
            "-movflags",
            "+faststart",
            &output.to_string_lossy(),
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        self.run_ffmpeg(&args).await
    }

    async fn mix(&self, job: &MixJob) -> Result<(), MediaError> {
        match build_mix_args(job) {
            Some(args) => self.run_ffmpeg(&args).await,
            // OriginalOnly: the concatenated stream already carries its audio
            None => Ok(()),
        }
    }
}
