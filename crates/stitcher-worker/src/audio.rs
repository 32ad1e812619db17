// Audio track reconciliation
//
// Produces one audio track whose duration equals the final concatenated
// video duration D:
// - voice: gain-scaled, starts at 0, never loops; silence-padded (`apad`)
//   or truncated to D
// - BGM: gain-scaled, looped (`aloop`) while shorter than D, then trimmed
//   (`atrim`) to exactly D
// - concurrent sources summed gain-weighted (`amix` with normalize=0);
//   sample-format conversion on encode clamps the output amplitude
//
// The video stream is copied untouched; only the audio is rebuilt.

use std::path::PathBuf;
use std::time::Duration;

use stitcher_core::{AudioPlan, Result, StitchError};

use crate::ffmpeg::MediaEngine;
use crate::normalize::{AUDIO_BITRATE, AUDIO_CHANNELS, AUDIO_SAMPLE_RATE};

/// A selected BGM track and its native duration
#[derive(Debug, Clone)]
pub struct BgmSource {
    pub path: PathBuf,
    pub native_duration: f64,
}

/// Everything the mix pass needs, resolved before it runs
#[derive(Debug, Clone)]
pub struct MixJob {
    /// Concatenated video (with the segments' original audio)
    pub video: PathBuf,
    pub voice: Option<PathBuf>,
    pub bgm: Option<BgmSource>,
    pub plan: AudioPlan,
    pub voice_volume: f32,
    pub bgm_volume: f32,
    /// Final video duration D in seconds
    pub duration: f64,
    pub output: PathBuf,
}

/// Filter chain for the voice overlay: play once from t=0, pad the
/// remainder with silence, truncate at D. Never loops.
fn voice_chain(input: usize, volume: f32, duration: f64) -> String {
    format!("[{input}:a]volume={volume},apad,atrim=duration={duration:.3}[voice]")
}

/// Filter chain for BGM: loop while shorter than D, then trim to exactly D.
/// Tracks longer than D are trimmed without looping.
fn bgm_chain(input: usize, volume: f32, native_duration: f64, duration: f64) -> String {
    if native_duration < duration {
        let loop_samples = (native_duration * f64::from(AUDIO_SAMPLE_RATE)).ceil() as u64;
        format!(
            "[{input}:a]volume={volume},aloop=loop=-1:size={loop_samples},\
             atrim=duration={duration:.3}[bgm]"
        )
    } else {
        format!("[{input}:a]volume={volume},atrim=duration={duration:.3}[bgm]")
    }
}

/// Gain-weighted summation of two labeled chains; normalize=0 keeps the
/// per-input volumes as the mix weights.
fn amix(a: &str, b: &str) -> String {
    format!("{a}{b}amix=inputs=2:duration=first:dropout_transition=0:normalize=0[aout]")
}

/// Build the full ffmpeg argument list for the mix pass.
///
/// Returns `None` for `OriginalOnly`: the concatenated stream already
/// carries the segments' audio and no pass is needed.
pub fn build_mix_args(job: &MixJob) -> Option<Vec<String>> {
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-i".into(),
        job.video.to_string_lossy().into(),
    ];
    let mut next_input = 1usize;

    let filter = match job.plan {
        AudioPlan::OriginalOnly => return None,
        AudioPlan::VoiceReplacement => {
            let voice = job.voice.as_ref()?;
            args.extend(["-i".into(), voice.to_string_lossy().into()]);
            let chain = voice_chain(next_input, job.voice_volume, job.duration);
            // The voice track alone replaces all segment audio
            chain.replace("[voice]", "[aout]")
        }
        AudioPlan::VoiceReplacementWithBgm => {
            let voice = job.voice.as_ref()?;
            let bgm = job.bgm.as_ref()?;
            args.extend(["-i".into(), voice.to_string_lossy().into()]);
            let voice_input = next_input;
            next_input += 1;
            args.extend(["-i".into(), bgm.path.to_string_lossy().into()]);
            let v = voice_chain(voice_input, job.voice_volume, job.duration);
            let b = bgm_chain(next_input, job.bgm_volume, bgm.native_duration, job.duration);
            format!("{v};{b};{}", amix("[voice]", "[bgm]"))
        }
        AudioPlan::OriginalWithBgm => {
            let bgm = job.bgm.as_ref()?;
            args.extend(["-i".into(), bgm.path.to_string_lossy().into()]);
            let b = bgm_chain(next_input, job.bgm_volume, bgm.native_duration, job.duration);
            format!("{b};{}", amix("[0:a]", "[bgm]"))
        }
    };

    args.extend([
        "-filter_complex".into(),
        filter,
        "-map".into(),
        "0:v".into(),
        "-map".into(),
        "[aout]".into(),
        "-c:v".into(),
        "copy".into(),
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
        job.output.to_string_lossy().into(),
    ]);

    Some(args)
}

/// Run the mix pass with its wall-clock budget
pub async fn mix_audio(engine: &dyn MediaEngine, timeout: Duration, job: &MixJob) -> Result<()> {
    match tokio::time::timeout(timeout, engine.mix(job)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(StitchError::audio_mix(e.to_string())),
        Err(_) => Err(StitchError::audio_mix(format!(
            "timed out after {}s",
            timeout.as_secs()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(plan: AudioPlan, bgm_native: f64, duration: f64) -> MixJob {
        MixJob {
            video: PathBuf::from("/ws/joined.mp4"),
            voice: Some(PathBuf::from("/ws/voice.mp3")),
            bgm: Some(BgmSource {
                path: PathBuf::from("/bgm/calm/track.mp3"),
                native_duration: bgm_native,
            }),
            plan,
            voice_volume: 1.5,
            bgm_volume: 0.3,
            duration,
            output: PathBuf::from("/ws/final.mp4"),
        }
    }

    fn filter_of(args: &[String]) -> String {
        let idx = args
            .iter()
            .position(|a| a == "-filter_complex")
            .expect("filter_complex present");
        args[idx + 1].clone()
    }

    #[test]
    fn original_only_needs_no_mix_pass() {
        assert!(build_mix_args(&job(AudioPlan::OriginalOnly, 10.0, 30.0)).is_none());
    }

    #[test]
    fn voice_never_loops_and_pads_with_silence() {
        let args = build_mix_args(&job(AudioPlan::VoiceReplacement, 10.0, 30.0)).unwrap();
        let filter = filter_of(&args);
        assert!(filter.contains("apad"));
        assert!(filter.contains("atrim=duration=30.000"));
        assert!(!filter.contains("aloop"));
        // Voice replaces segment audio: the original audio stream is unmapped
        assert!(!filter.contains("[0:a]"));
        assert!(args.join(" ").contains("-map [aout]"));
    }

    #[test]
    fn short_bgm_loops_then_trims_to_exactly_final_duration() {
        let args = build_mix_args(&job(AudioPlan::OriginalWithBgm, 10.0, 30.0)).unwrap();
        let filter = filter_of(&args);
        // d < D: loop, sized to the track's native sample count
        assert!(filter.contains("aloop=loop=-1:size=441000"));
        assert!(filter.contains("atrim=duration=30.000"));
        assert!(filter.contains("[0:a]"));
    }

    #[test]
    fn long_bgm_is_truncated_without_looping() {
        let args = build_mix_args(&job(AudioPlan::OriginalWithBgm, 95.0, 30.0)).unwrap();
        let filter = filter_of(&args);
        assert!(!filter.contains("aloop"));
        assert!(filter.contains("atrim=duration=30.000"));
    }

    #[test]
    fn bgm_exactly_covering_d_is_trimmed_not_looped() {
        let args = build_mix_args(&job(AudioPlan::OriginalWithBgm, 30.0, 30.0)).unwrap();
        assert!(!filter_of(&args).contains("aloop"));
    }

    #[test]
    fn voice_with_bgm_mixes_gain_weighted_without_normalization() {
        let args = build_mix_args(&job(AudioPlan::VoiceReplacementWithBgm, 10.0, 30.0)).unwrap();
        let filter = filter_of(&args);
        assert!(filter.contains("volume=1.5"));
        assert!(filter.contains("volume=0.3"));
        assert!(filter.contains("amix=inputs=2:duration=first:dropout_transition=0:normalize=0"));
        // Both overlays present, original segment audio replaced
        assert!(filter.contains("[voice][bgm]"));
        assert!(!filter.contains("[0:a]"));
    }

    #[test]
    fn video_stream_is_copied_not_reencoded() {
        let args = build_mix_args(&job(AudioPlan::VoiceReplacement, 10.0, 30.0)).unwrap();
        assert!(args.join(" ").contains("-c:v copy"));
    }
}
