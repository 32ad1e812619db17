// Error types for the stitching pipeline

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, StitchError>;

/// Errors that can occur while validating a request or running the pipeline
#[derive(Debug, Error)]
pub enum StitchError {
    /// Malformed or out-of-range request; rejected before a session exists
    #[error("validation error: {0}")]
    Validation(String),

    /// Unreachable URL, unsupported content type, or retries exhausted.
    /// `retryable` is false for permanent failures (4xx, bad content type).
    #[error("download failed for {url}: {reason}")]
    Download {
        url: String,
        reason: String,
        retryable: bool,
    },

    /// The BGM library has no tracks at all
    #[error("no background music tracks available")]
    BgmUnavailable,

    /// Decode or re-encode failure on a specific segment; not retried
    #[error("encoding failed for segment {sequence}: {reason}")]
    Encoding { sequence: i32, reason: String },

    /// Corrupt/unreadable audio source or mixing failure
    #[error("audio mix failed: {0}")]
    AudioMix(String),

    /// Join-stage failure; implies an upstream invariant violation
    #[error("concatenation failed: {0}")]
    Concatenation(String),

    /// Artifact publication failed after retries
    #[error("upload failed: {0}")]
    Upload(String),

    /// Status/delete query on an unknown or expired identifier
    #[error("session not found: {0}")]
    SessionNotFound(Uuid),

    /// Internal error (store failures, I/O on the workspace, etc.)
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl StitchError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        StitchError::Validation(msg.into())
    }

    /// Create a transient download error (timeouts, 5xx); eligible for retry
    pub fn download(url: impl Into<String>, reason: impl Into<String>) -> Self {
        StitchError::Download {
            url: url.into(),
            reason: reason.into(),
            retryable: true,
        }
    }

    /// Create a permanent download error (4xx, unsupported content type)
    pub fn download_permanent(url: impl Into<String>, reason: impl Into<String>) -> Self {
        StitchError::Download {
            url: url.into(),
            reason: reason.into(),
            retryable: false,
        }
    }

    /// Create an encoding error for a specific segment
    pub fn encoding(sequence: i32, reason: impl Into<String>) -> Self {
        StitchError::Encoding {
            sequence,
            reason: reason.into(),
        }
    }

    /// Create an audio mix error
    pub fn audio_mix(msg: impl Into<String>) -> Self {
        StitchError::AudioMix(msg.into())
    }

    /// Create a concatenation error
    pub fn concatenation(msg: impl Into<String>) -> Self {
        StitchError::Concatenation(msg.into())
    }

    /// Create an upload error
    pub fn upload(msg: impl Into<String>) -> Self {
        StitchError::Upload(msg.into())
    }

    /// Stable error kind string surfaced to callers in the session record
    pub fn kind(&self) -> &'static str {
        match self {
            StitchError::Validation(_) => "ValidationError",
            StitchError::Download { .. } => "DownloadError",
            StitchError::BgmUnavailable => "BgmUnavailableError",
            StitchError::Encoding { .. } => "EncodingError",
            StitchError::AudioMix(_) => "AudioMixError",
            StitchError::Concatenation(_) => "ConcatenationError",
            StitchError::Upload(_) => "UploadError",
            StitchError::SessionNotFound(_) => "SessionNotFoundError",
            StitchError::Internal(_) => "InternalError",
        }
    }

    /// Network-class errors are retried with bounded backoff before surfacing
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StitchError::Download {
                retryable: true,
                ..
            } | StitchError::Upload(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_strings_match_wire_taxonomy() {
        assert_eq!(
            StitchError::download("http://x", "timeout").kind(),
            "DownloadError"
        );
        assert_eq!(StitchError::BgmUnavailable.kind(), "BgmUnavailableError");
        assert_eq!(StitchError::encoding(3, "bad nal").kind(), "EncodingError");
        assert_eq!(StitchError::audio_mix("corrupt").kind(), "AudioMixError");
        assert_eq!(
            StitchError::concatenation("drift").kind(),
            "ConcatenationError"
        );
        assert_eq!(StitchError::upload("503").kind(), "UploadError");
        assert_eq!(
            StitchError::validation("empty videos").kind(),
            "ValidationError"
        );
    }

    #[test]
    fn only_network_class_errors_are_transient() {
        assert!(StitchError::download("http://x", "reset").is_transient());
        assert!(StitchError::upload("reset").is_transient());
        assert!(!StitchError::download_permanent("http://x", "404").is_transient());
        assert!(!StitchError::encoding(0, "bad").is_transient());
        assert!(!StitchError::validation("bad").is_transient());
        assert!(!StitchError::BgmUnavailable.is_transient());
    }
}
