// Pipeline execution
//
// One StitchPipeline instance is shared by all sessions; `run` drives a
// single session from acquisition to publication, updating the session
// record at every stage boundary. The pipeline task is the only writer of
// its session record; pollers read snapshots through the store.

use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use stitcher_core::{
    AudioPlan, BgmLibrary, ObjectStore, PipelineConfig, Result, Session, SessionStore,
    StitchError, StitchRequest,
};

use crate::acquire::{fetch_with_retry, Fetcher};
use crate::audio::{mix_audio, BgmSource, MixJob};
use crate::bgm::select_track;
use crate::concat::concat_segments;
use crate::ffmpeg::MediaEngine;
use crate::normalize::{normalize_segment, TargetProfile};
use crate::publish::publish_artifact;
use crate::segment::{order_segments, VideoSegment};
use crate::workspace::Workspace;

/// Progress bands, one per stage boundary. Values only ever move forward.
pub mod band {
    /// Video downloads advance through 10-40
    pub const ACQUIRE_START: u8 = 10;
    pub const ACQUIRE_END: u8 = 40;
    /// Voice download lands at 45
    pub const VOICE_END: u8 = 45;
    /// BGM selection lands inside 45-50
    pub const BGM_END: u8 = 48;
    /// Normalization advances through 50-60
    pub const NORMALIZE_START: u8 = 50;
    pub const NORMALIZE_END: u8 = 60;
    /// Join completes at 70
    pub const CONCAT_END: u8 = 70;
    /// Audio reconciliation completes the 50-80 band
    pub const MIX_END: u8 = 80;
    /// Upload runs from 85 to completion at 100
    pub const UPLOAD_START: u8 = 85;
}

/// Map completed video fetches into the 10-40 band
pub fn fetch_progress(done: usize, total: usize) -> u8 {
    let span = usize::from(band::ACQUIRE_END - band::ACQUIRE_START);
    band::ACQUIRE_START + (span * done / total.max(1)) as u8
}

/// Map completed normalizations into the 50-60 band
pub fn normalize_progress(done: usize, total: usize) -> u8 {
    let span = usize::from(band::NORMALIZE_END - band::NORMALIZE_START);
    band::NORMALIZE_START + (span * done / total.max(1)) as u8
}

/// The session record plus its store; the single writer for one session
struct SessionWriter {
    session: Session,
    store: Arc<dyn SessionStore>,
}

impl SessionWriter {
    async fn advance(&mut self, progress: u8, message: impl Into<String>) -> Result<()> {
        self.session.advance(progress, message);
        self.store.update(&self.session).await
    }

    async fn complete(&mut self, artifact_url: String) -> Result<()> {
        self.session.complete(artifact_url);
        self.store.update(&self.session).await
    }

    async fn fail(&mut self, err: &StitchError) -> Result<()> {
        self.session.fail(err);
        self.store.update(&self.session).await
    }
}

/// Drives one session through every stage
pub struct StitchPipeline {
    store: Arc<dyn SessionStore>,
    fetcher: Arc<dyn Fetcher>,
    engine: Arc<dyn MediaEngine>,
    bgm: Arc<dyn BgmLibrary>,
    objects: Arc<dyn ObjectStore>,
    config: Arc<PipelineConfig>,
}

impl StitchPipeline {
    pub fn new(
        store: Arc<dyn SessionStore>,
        fetcher: Arc<dyn Fetcher>,
        engine: Arc<dyn MediaEngine>,
        bgm: Arc<dyn BgmLibrary>,
        objects: Arc<dyn ObjectStore>,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            store,
            fetcher,
            engine,
            bgm,
            objects,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Run a session to its terminal state. The workspace is torn down on
    /// every exit path; errors here never propagate to the spawner.
    pub async fn run(&self, session: Session) {
        let session_id = session.id;
        let request = session.request.clone();
        let writer = Arc::new(Mutex::new(SessionWriter {
            session,
            store: self.store.clone(),
        }));

        let workspace = match Workspace::create(&self.config.work_dir, session_id).await {
            Ok(ws) => ws,
            Err(e) => {
                error!(session_id = %session_id, error = %e, "Failed to create workspace");
                if let Err(e) = writer.lock().await.fail(&e).await {
                    error!(session_id = %session_id, error = %e, "Failed to record session failure");
                }
                return;
            }
        };

        match self.execute(&writer, &workspace, &request).await {
            Ok(artifact_url) => {
                info!(session_id = %session_id, url = %artifact_url, "Session completed");
                if let Err(e) = writer.lock().await.complete(artifact_url).await {
                    error!(session_id = %session_id, error = %e, "Failed to record session completion");
                }
            }
            Err(e) => {
                warn!(session_id = %session_id, kind = e.kind(), error = %e, "Session failed");
                if let Err(e) = writer.lock().await.fail(&e).await {
                    error!(session_id = %session_id, error = %e, "Failed to record session failure");
                }
            }
        }

        if let Err(e) = workspace.cleanup().await {
            warn!(session_id = %session_id, error = %e, "Workspace cleanup failed");
        }
    }

    async fn execute(
        &self,
        writer: &Arc<Mutex<SessionWriter>>,
        workspace: &Workspace,
        request: &StitchRequest,
    ) -> Result<String> {
        let session_id = writer.lock().await.session.id;

        // --- Acquisition: videos, bounded fan-out ---
        writer
            .lock()
            .await
            .advance(band::ACQUIRE_START, "Downloading video segments")
            .await?;

        let mut segments = VideoSegment::from_items(&request.videos);
        for segment in segments.iter_mut() {
            segment.local_path = workspace.file(format!("input_{}.mp4", segment.input_index));
        }

        let total = segments.len();
        let completed = Arc::new(AtomicUsize::new(0));
        let results: Vec<Result<()>> = futures::stream::iter(segments.iter().map(|segment| {
            let completed = completed.clone();
            let writer = writer.clone();
            async move {
                fetch_with_retry(
                    self.fetcher.as_ref(),
                    &self.config.retry,
                    self.config.download_timeout,
                    &segment.source_url,
                    &segment.local_path,
                )
                .await?;
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                writer
                    .lock()
                    .await
                    .advance(
                        fetch_progress(done, total),
                        format!("Downloaded {done}/{total} videos"),
                    )
                    .await
            }
        // Materialize the futures before building the stream: passing the
        // lazy Map iterator straight to stream::iter trips rustc's
        // "implementation of Send is not general enough" limitation
        // (rust-lang/rust#110338) once the pipeline future is spawned.
        }).collect::<Vec<_>>())
        .buffer_unordered(self.config.download_fanout)
        .collect()
        .await;
        results.into_iter().collect::<Result<Vec<_>>>()?;

        // --- Acquisition: voice overlay ---
        let voice_path: Option<PathBuf> = match &request.voice_url {
            Some(url) => {
                let dest = workspace.file("voice_input");
                fetch_with_retry(
                    self.fetcher.as_ref(),
                    &self.config.retry,
                    self.config.download_timeout,
                    url,
                    &dest,
                )
                .await?;
                writer
                    .lock()
                    .await
                    .advance(band::VOICE_END, "Voice track downloaded")
                    .await?;
                Some(dest)
            }
            None => None,
        };

        // --- BGM selection ---
        let bgm_track = select_track(
            self.bgm.as_ref(),
            request.bgm_enabled,
            request.bgm_category.as_deref(),
        )
        .await?;
        if bgm_track.is_some() {
            writer
                .lock()
                .await
                .advance(band::BGM_END, "Background music selected")
                .await?;
        }

        // --- Normalization, bounded concurrency ---
        writer
            .lock()
            .await
            .advance(band::NORMALIZE_START, "Normalizing video segments")
            .await?;

        let profile = TargetProfile::for_mode(request.mode);
        for segment in segments.iter_mut() {
            segment.normalized_path =
                Some(workspace.file(format!("normalized_{}.mp4", segment.input_index)));
        }
        let completed = Arc::new(AtomicUsize::new(0));
        let results: Vec<Result<()>> = futures::stream::iter(segments.iter().map(|segment| {
            let completed = completed.clone();
            let writer = writer.clone();
            let output = segment.normalized_path.clone().unwrap_or_default();
            async move {
                normalize_segment(
                    self.engine.as_ref(),
                    self.config.encode_timeout,
                    segment,
                    &output,
                    &profile,
                )
                .await?;
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                writer
                    .lock()
                    .await
                    .advance(
                        normalize_progress(done, total),
                        format!("Normalized {done}/{total} segments"),
                    )
                    .await
            }
        // Same rust-lang/rust#110338 workaround as the download fan-out above.
        }).collect::<Vec<_>>())
        .buffer_unordered(self.config.encode_concurrency)
        .collect()
        .await;
        results.into_iter().collect::<Result<Vec<_>>>()?;

        // --- Ordered concatenation ---
        order_segments(&mut segments);
        let joined = workspace.file("joined.mp4");
        concat_segments(
            self.engine.as_ref(),
            self.config.encode_timeout,
            &segments,
            workspace,
            &joined,
        )
        .await?;
        writer
            .lock()
            .await
            .advance(band::CONCAT_END, "Segments concatenated")
            .await?;

        // --- Audio reconciliation ---
        let plan = request.audio_plan();
        let final_path = if plan == AudioPlan::OriginalOnly {
            joined
        } else {
            let duration = self
                .engine
                .probe(&joined)
                .await
                .map_err(|e| StitchError::audio_mix(e.to_string()))?
                .duration;

            let bgm_source = match &bgm_track {
                Some(track) => Some(BgmSource {
                    native_duration: self
                        .engine
                        .probe(&track.path)
                        .await
                        .map_err(|e| StitchError::audio_mix(e.to_string()))?
                        .duration,
                    path: track.path.clone(),
                }),
                None => None,
            };

            let output = workspace.file("final.mp4");
            let job = MixJob {
                video: joined,
                voice: voice_path,
                bgm: bgm_source,
                plan,
                voice_volume: request.voice_volume,
                bgm_volume: request.bgm_volume,
                duration,
                output: output.clone(),
            };
            mix_audio(self.engine.as_ref(), self.config.encode_timeout, &job).await?;
            output
        };
        writer
            .lock()
            .await
            .advance(band::MIX_END, "Audio track mixed")
            .await?;

        // --- Publication ---
        writer
            .lock()
            .await
            .advance(band::UPLOAD_START, "Uploading final video")
            .await?;
        publish_artifact(
            self.objects.as_ref(),
            &self.config.retry,
            self.config.upload_timeout,
            session_id,
            &final_path,
        )
        .await
    }
}
