// Stitching domain core
//
// This crate provides the domain model for the asynchronous video stitching
// pipeline, independent of any storage, HTTP, or ffmpeg binding.
//
// Key design decisions:
// - Traits (SessionStore, ObjectStore, BgmLibrary) for pluggable backends
// - Session owns its state machine: transitions are monotonic, terminal
//   states are final, progress never decreases
// - The audio composition strategy is an explicit tagged variant (AudioPlan)
//   selected deterministically from the request
// - Network retries are an explicit bounded-backoff policy object shared by
//   acquisition and publication
// - Error handling distinguishes transient (retryable) from permanent errors

pub mod config;
pub mod error;
pub mod memory;
pub mod retry;
pub mod session;
pub mod traits;

// Re-exports for convenience
pub use config::PipelineConfig;
pub use error::{Result, StitchError};
pub use memory::{InMemoryBgmLibrary, InMemoryObjectStore, InMemorySessionStore};
pub use retry::RetryPolicy;
pub use session::{
    AudioPlan, Mode, Session, SessionError, SessionStatus, StitchRequest, VideoItem,
};
pub use traits::{BgmLibrary, BgmTrack, ObjectStore, SessionStats, SessionStore};
