// Per-session workspace
//
// Every pipeline execution owns one directory under the configured work
// root, named by session ID. Nothing outside the owning task touches it,
// which is what isolates concurrently running jobs from each other.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};
use uuid::Uuid;

use stitcher_core::{Result, StitchError};

/// Ephemeral, exclusively-owned storage for one session's intermediate files
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    cleaned: AtomicBool,
}

impl Workspace {
    /// Create the workspace directory for a session
    pub async fn create(work_root: &Path, session_id: Uuid) -> Result<Self> {
        let root = work_root.join(session_id.to_string());
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| StitchError::Internal(anyhow::anyhow!(
                "failed to create workspace {}: {e}",
                root.display()
            )))?;
        debug!(path = %root.display(), "Workspace created");
        Ok(Self {
            root,
            cleaned: AtomicBool::new(false),
        })
    }

    /// The workspace root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path for a file inside the workspace
    pub fn file(&self, name: impl AsRef<Path>) -> PathBuf {
        self.root.join(name)
    }

    /// Remove the workspace and everything in it.
    ///
    /// Idempotent: the second call (or a call after the directory is already
    /// gone) is a no-op.
    pub async fn cleanup(&self) -> Result<()> {
        if self.cleaned.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => {
                debug!(path = %self.root.display(), "Workspace removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StitchError::Internal(anyhow::anyhow!(
                "failed to remove workspace {}: {e}",
                self.root.display()
            ))),
        }
    }
}

/// Crash-recovery sweep: remove every leftover workspace directory under the
/// work root. Called once at startup, before any session is spawned.
pub async fn sweep_orphans(work_root: &Path) -> Result<u64> {
    let mut removed = 0u64;
    let mut entries = match tokio::fs::read_dir(work_root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => {
            return Err(StitchError::Internal(anyhow::anyhow!(
                "failed to read work root {}: {e}",
                work_root.display()
            )))
        }
    };
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StitchError::Internal(e.into()))?
    {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove orphaned workspace"),
        }
    }
    Ok(removed)
}
