// Segment normalization
//
// Concatenation at the container level requires identical codec, resolution,
// and frame rate across inputs, so every segment is re-encoded to one target
// profile before the join. This is a correctness precondition, not an
// optimization.

use std::path::Path;
use std::time::Duration;

use stitcher_core::{Mode, Result, StitchError};

use crate::ffmpeg::{MediaEngine, MediaInfo};
use crate::segment::VideoSegment;

/// Audio parameters shared by normalization and mixing
pub const AUDIO_SAMPLE_RATE: u32 = 44100;
pub const AUDIO_CHANNELS: u32 = 2;
pub const AUDIO_BITRATE: &str = "128k";

/// How a clip is mapped onto the target frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalePolicy {
    /// Scale to fit, pad the remainder (letterbox/pillarbox)
    FitPad,
    /// Scale to fill, crop the overflow
    FillCrop,
}

/// The single encode target every segment is converted to:
/// H.264 video, AAC audio, fixed frame rate, mode-dependent frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetProfile {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub scale: ScalePolicy,
}

impl TargetProfile {
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Portrait => Self {
                width: 1080,
                height: 1920,
                fps: 30,
                scale: ScalePolicy::FitPad,
            },
            Mode::Landscape => Self {
                width: 1920,
                height: 1080,
                fps: 30,
                scale: ScalePolicy::FillCrop,
            },
        }
    }

    /// ffmpeg video filter chain realizing the resolution policy
    pub fn video_filter(&self) -> String {
        let (w, h) = (self.width, self.height);
        match self.scale {
            ScalePolicy::FitPad => format!(
                "scale={w}:{h}:force_original_aspect_ratio=decrease,\
                 pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,fps={fps}",
                fps = self.fps
            ),
            ScalePolicy::FillCrop => format!(
                "scale={w}:{h}:force_original_aspect_ratio=increase,\
                 crop={w}:{h},fps={fps}",
                fps = self.fps
            ),
        }
    }
}

/// Build the full ffmpeg argument list for normalizing one clip.
///
/// Clips without an audio stream get a silent stereo track so the joined
/// stream has uniform stream layout.
pub fn build_normalize_args(
    input: &Path,
    output: &Path,
    profile: &TargetProfile,
    info: &MediaInfo,
) -> Vec<String> {
    let mut args: Vec<String> = vec!["-y".into(), "-i".into(), input.to_string_lossy().into()];

    if !info.has_audio {
        args.extend([
            "-f".into(),
            "lavfi".into(),
            "-t".into(),
            format!("{:.3}", info.duration),
            "-i".into(),
            format!("anullsrc=channel_layout=stereo:sample_rate={AUDIO_SAMPLE_RATE}"),
            "-map".into(),
            "0:v".into(),
            "-map".into(),
            "1:a".into(),
            "-shortest".into(),
        ]);
    }

    args.extend([
        "-vf".into(),
        profile.video_filter(),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        "fast".into(),
        "-crf".into(),
        "23".into(),
        "-c:a".into(),
        "aac".into(),
        "-ar".into(),
        AUDIO_SAMPLE_RATE.to_string(),
        "-ac".into(),
        AUDIO_CHANNELS.to_string(),
        "-b:a".into(),
        AUDIO_BITRATE.into(),
        "-movflags".into(),
        "+faststart".into(),
        output.to_string_lossy().into(),
    ]);

    args
}

/// Normalize one segment, attributing failures to its sequence key.
/// Encoding failures are assumed input-caused and are never retried.
pub async fn normalize_segment(
    engine: &dyn MediaEngine,
    timeout: Duration,
    segment: &VideoSegment,
    output: &Path,
    profile: &TargetProfile,
) -> Result<()> {
    match tokio::time::timeout(timeout, engine.normalize(&segment.local_path, output, profile))
        .await
    {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(StitchError::encoding(segment.sequence, e.to_string())),
        Err(_) => Err(StitchError::encoding(
            segment.sequence,
            format!("timed out after {}s", timeout.as_secs()),
        )),
    }
}
