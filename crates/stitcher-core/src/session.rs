// Session domain types
//
// The Session is the persisted record and lifecycle of one stitching job.
// Used by the API (creation, polling) and the worker (single writer during
// pipeline execution).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StitchError;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Session status; `Completed` and `Failed` are terminal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Processing,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Processing => write!(f, "processing"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Failed => write!(f, "failed"),
        }
    }
}

impl From<&str> for SessionStatus {
    fn from(s: &str) -> Self {
        match s {
            "completed" => SessionStatus::Completed,
            "failed" => SessionStatus::Failed,
            _ => SessionStatus::Processing,
        }
    }
}

/// Structured error captured on a failed session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct SessionError {
    /// Stable kind string, e.g. "DownloadError"
    pub kind: String,
    pub message: String,
}

impl From<&StitchError> for SessionError {
    fn from(err: &StitchError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// One input clip with its caller-supplied ordering key
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct VideoItem {
    pub url: String,
    /// Ordering key; need not be contiguous, start at zero, or be unique.
    /// Ties are broken by original input order.
    pub sequence: i32,
}

/// Output orientation; drives the normalization resolution policy
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Scale to fit the target frame, pad to fill (letterbox/pillarbox)
    #[default]
    Portrait,
    /// Scale to fill the target frame, crop the overflow
    Landscape,
}

/// The immutable request payload as submitted by the caller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct StitchRequest {
    pub videos: Vec<VideoItem>,
    #[serde(default)]
    pub voice_url: Option<String>,
    #[serde(default = "default_voice_volume")]
    pub voice_volume: f32,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub bgm_enabled: bool,
    #[serde(default)]
    pub bgm_category: Option<String>,
    #[serde(default = "default_bgm_volume")]
    pub bgm_volume: f32,
}

fn default_voice_volume() -> f32 {
    1.0
}

fn default_bgm_volume() -> f32 {
    0.3
}

/// Valid range for voice and BGM gain
pub const VOLUME_RANGE: std::ops::RangeInclusive<f32> = 0.0..=2.0;

impl StitchRequest {
    /// Validate the request before any session is created.
    ///
    /// Validation failures are reported synchronously to the caller and
    /// never produce a session record.
    pub fn validate(&self) -> Result<(), StitchError> {
        if self.videos.is_empty() {
            return Err(StitchError::validation("at least one video is required"));
        }
        if !VOLUME_RANGE.contains(&self.voice_volume) {
            return Err(StitchError::validation(format!(
                "voice_volume must be between 0.0 and 2.0, got {}",
                self.voice_volume
            )));
        }
        if !VOLUME_RANGE.contains(&self.bgm_volume) {
            return Err(StitchError::validation(format!(
                "bgm_volume must be between 0.0 and 2.0, got {}",
                self.bgm_volume
            )));
        }
        for video in &self.videos {
            if video.url.is_empty() {
                return Err(StitchError::validation("video url must not be empty"));
            }
        }
        Ok(())
    }

    /// Deterministically select the audio composition strategy.
    ///
    /// Voice overlay policy is "replace all segment audio", never "mix with
    /// it"; BGM layers on top of whichever base is active.
    pub fn audio_plan(&self) -> AudioPlan {
        match (self.voice_url.is_some(), self.bgm_enabled) {
            (false, false) => AudioPlan::OriginalOnly,
            (false, true) => AudioPlan::OriginalWithBgm,
            (true, false) => AudioPlan::VoiceReplacement,
            (true, true) => AudioPlan::VoiceReplacementWithBgm,
        }
    }
}

/// Audio composition strategy, selected once from the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioPlan {
    /// Keep each segment's original audio as-is
    OriginalOnly,
    /// Original segment audio mixed with BGM
    OriginalWithBgm,
    /// Voice overlay replaces all segment audio
    VoiceReplacement,
    /// Voice overlay replaces segment audio, BGM mixed underneath
    VoiceReplacementWithBgm,
}

impl AudioPlan {
    pub fn has_voice(&self) -> bool {
        matches!(
            self,
            AudioPlan::VoiceReplacement | AudioPlan::VoiceReplacementWithBgm
        )
    }

    pub fn has_bgm(&self) -> bool {
        matches!(
            self,
            AudioPlan::OriginalWithBgm | AudioPlan::VoiceReplacementWithBgm
        )
    }
}

/// Session - persisted record of one stitching job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Session {
    pub id: Uuid,
    pub status: SessionStatus,
    /// 0-100, monotonically non-decreasing while processing
    pub progress: u8,
    /// Human-readable description of the current stage
    pub message: String,
    /// The request as submitted, echoed back on status queries
    pub request: StitchRequest,
    /// Durable artifact URL; set only on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_url: Option<String>,
    /// Structured error; set only on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SessionError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new session in its initial state
    pub fn new(request: StitchRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            status: SessionStatus::Processing,
            progress: 0,
            message: "Session created, starting video processing".to_string(),
            request,
            artifact_url: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Advance progress within the processing state.
    ///
    /// Progress never moves backwards and terminal sessions never change.
    pub fn advance(&mut self, progress: u8, message: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.progress = self.progress.max(progress.min(100));
        self.message = message.into();
        self.updated_at = Utc::now();
    }

    /// Transition to `Completed` with the published artifact URL
    pub fn complete(&mut self, artifact_url: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = SessionStatus::Completed;
        self.progress = 100;
        self.message = "Video processing completed".to_string();
        self.artifact_url = Some(artifact_url.into());
        self.error = None;
        self.updated_at = Utc::now();
    }

    /// Transition to `Failed`, capturing the triggering error.
    ///
    /// Progress freezes at its last successful value.
    pub fn fail(&mut self, err: &StitchError) {
        if self.status.is_terminal() {
            return;
        }
        self.status = SessionStatus::Failed;
        self.message = format!("Processing failed: {err}");
        self.error = Some(SessionError::from(err));
        self.artifact_url = None;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(videos: Vec<VideoItem>) -> StitchRequest {
        StitchRequest {
            videos,
            voice_url: None,
            voice_volume: 1.0,
            mode: Mode::Portrait,
            bgm_enabled: false,
            bgm_category: None,
            bgm_volume: 0.3,
        }
    }

    fn one_video() -> Vec<VideoItem> {
        vec![VideoItem {
            url: "https://cdn.example.com/a.mp4".to_string(),
            sequence: 0,
        }]
    }

    #[test]
    fn empty_video_list_is_rejected() {
        let err = request(vec![]).validate().unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
    }

    #[test]
    fn out_of_range_volumes_are_rejected() {
        let mut req = request(one_video());
        req.voice_volume = 3.0;
        assert_eq!(req.validate().unwrap_err().kind(), "ValidationError");

        let mut req = request(one_video());
        req.bgm_volume = -1.0;
        assert_eq!(req.validate().unwrap_err().kind(), "ValidationError");
    }

    #[test]
    fn boundary_volumes_are_accepted() {
        let mut req = request(one_video());
        req.voice_volume = 0.0;
        req.bgm_volume = 2.0;
        assert!(req.validate().is_ok());
    }

    #[test]
    fn request_defaults() {
        let req: StitchRequest =
            serde_json::from_str(r#"{"videos":[{"url":"https://x/a.mp4","sequence":0}]}"#).unwrap();
        assert_eq!(req.voice_volume, 1.0);
        assert_eq!(req.bgm_volume, 0.3);
        assert_eq!(req.mode, Mode::Portrait);
        assert!(!req.bgm_enabled);
    }

    #[test]
    fn audio_plan_selection_is_deterministic() {
        let mut req = request(one_video());
        assert_eq!(req.audio_plan(), AudioPlan::OriginalOnly);

        req.bgm_enabled = true;
        assert_eq!(req.audio_plan(), AudioPlan::OriginalWithBgm);

        req.voice_url = Some("https://cdn.example.com/v.mp3".to_string());
        assert_eq!(req.audio_plan(), AudioPlan::VoiceReplacementWithBgm);

        req.bgm_enabled = false;
        assert_eq!(req.audio_plan(), AudioPlan::VoiceReplacement);
    }

    #[test]
    fn progress_is_monotonic() {
        let mut session = Session::new(request(one_video()));
        session.advance(40, "normalizing");
        session.advance(10, "late write");
        assert_eq!(session.progress, 40);
    }

    #[test]
    fn terminal_states_are_final() {
        let mut session = Session::new(request(one_video()));
        session.complete("https://store.example.com/out.mp4");
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.progress, 100);

        // No transition out of a terminal state
        session.fail(&StitchError::upload("late failure"));
        assert_eq!(session.status, SessionStatus::Completed);
        assert!(session.error.is_none());
        session.advance(10, "stray write");
        assert_eq!(session.progress, 100);
    }

    #[test]
    fn terminal_exclusivity_of_artifact_and_error() {
        let mut ok = Session::new(request(one_video()));
        ok.complete("https://store.example.com/out.mp4");
        assert!(ok.artifact_url.is_some() && ok.error.is_none());

        let mut failed = Session::new(request(one_video()));
        failed.advance(35, "downloading");
        failed.fail(&StitchError::download("https://x/a.mp4", "unreachable"));
        assert!(failed.artifact_url.is_none() && failed.error.is_some());
        assert_eq!(failed.error.as_ref().unwrap().kind, "DownloadError");
        // Progress freezes at its last successful value
        assert_eq!(failed.progress, 35);
    }
}
