// Stitching pipeline worker
//
// Executes accepted stitch sessions in the background: acquires remote
// media, normalizes each clip to a shared encoding profile, joins them by
// stream copy, reconciles the audio track, and publishes the final artifact.
//
// Key design decisions:
// - All codec work shells out to ffmpeg/ffprobe; the MediaEngine trait is
//   the seam that keeps pipeline tests binary-free
// - Remote acquisition goes through the Fetcher trait for the same reason
// - Each session owns an isolated workspace directory, removed on every
//   exit path and swept at startup after a crash
// - Stage concurrency is bounded per session (download fan-out, encode
//   parallelism) so one large request cannot starve the process

pub mod acquire;
pub mod audio;
pub mod bgm;
pub mod concat;
pub mod ffmpeg;
pub mod normalize;
pub mod pipeline;
pub mod publish;
pub mod runner;
pub mod segment;
pub mod workspace;

pub use acquire::{Fetcher, HttpFetcher};
pub use bgm::FsBgmLibrary;
pub use ffmpeg::{FfmpegEngine, MediaEngine, MediaError, MediaInfo};
pub use pipeline::StitchPipeline;
pub use publish::artifact_key;
pub use runner::StitchRunner;
pub use workspace::Workspace;
