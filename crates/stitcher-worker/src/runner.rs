// Session runner
//
// Owns the background side of the service: spawns one detached task per
// accepted session, runs the periodic retention sweep, and clears orphaned
// workspaces left behind by a previous process.

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};

use stitcher_core::{Result, Session};

use crate::pipeline::StitchPipeline;
use crate::workspace::sweep_orphans;

/// Spawns pipeline tasks and maintenance loops
#[derive(Clone)]
pub struct StitchRunner {
    pipeline: Arc<StitchPipeline>,
    active: Arc<AtomicUsize>,
}

impl StitchRunner {
    pub fn new(pipeline: Arc<StitchPipeline>) -> Self {
        Self {
            pipeline,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sessions currently executing in this process
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Spawn a detached pipeline task for an accepted session. Returns
    /// immediately; the session record carries all further progress.
    pub fn spawn(&self, session: Session) {
        let session_id = session.id;
        let pipeline = self.pipeline.clone();
        let active = self.active.clone();
        active.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(
            async move {
                pipeline.run(session).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }
            .instrument(info_span!("stitch_session", session_id = %session_id)),
        );
    }

    /// Run one retention sweep now: delete terminal sessions past the
    /// retention window.
    pub async fn sweep_retention(&self) -> Result<u64> {
        let config = self.pipeline.config();
        let cutoff = Utc::now()
            - ChronoDuration::from_std(config.retention)
                .unwrap_or_else(|_| ChronoDuration::days(7));
        let removed = self
            .pipeline
            .store()
            .delete_terminal_older_than(cutoff)
            .await?;
        if removed > 0 {
            info!(removed, "Retention sweep removed expired sessions");
        }
        Ok(removed)
    }

    /// Spawn the periodic retention sweep loop
    pub fn spawn_retention_sweep(&self) {
        let runner = self.clone();
        let interval = self.pipeline.config().sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = runner.sweep_retention().await {
                    error!(error = %e, "Retention sweep failed");
                }
            }
        });
    }

    /// Startup recovery: remove workspace directories orphaned by a crash.
    /// Sessions those directories belonged to stay in whatever state was
    /// last persisted; their intermediate files are unusable either way.
    pub async fn recover(&self) {
        match sweep_orphans(&self.pipeline.config().work_dir).await {
            Ok(0) => {}
            Ok(removed) => info!(removed, "Removed orphaned workspaces"),
            Err(e) => warn!(error = %e, "Orphaned workspace sweep failed"),
        }
    }
}
