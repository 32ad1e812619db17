// Ordered concatenation of normalized segments
//
// Segments are joined with ffmpeg's concat demuxer and stream copy.
// Normalization already made every segment share one codec, resolution, and
// frame rate, so the join introduces no seams, timestamp discontinuities,
// or re-encode generation loss.

use std::path::{Path, PathBuf};
use std::time::Duration;

use stitcher_core::{Result, StitchError};

use crate::ffmpeg::MediaEngine;
use crate::segment::VideoSegment;
use crate::workspace::Workspace;

/// Build the concat-demuxer manifest: one `file '<path>'` line per segment,
/// in the already-ordered segment order.
pub fn build_manifest(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("file '{}'", p.to_string_lossy()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Join ordered, normalized segments into one continuous stream.
///
/// The caller must have ordered `segments` (see `segment::order_segments`)
/// and normalized each one. A segment without a normalized path is a
/// list-integrity defect and fails the join.
pub async fn concat_segments(
    engine: &dyn MediaEngine,
    timeout: Duration,
    segments: &[VideoSegment],
    workspace: &Workspace,
    output: &Path,
) -> Result<()> {
    let paths: Vec<PathBuf> = segments
        .iter()
        .map(|s| {
            s.normalized_path.clone().ok_or_else(|| {
                StitchError::concatenation(format!(
                    "segment {} (input {}) was never normalized",
                    s.sequence, s.input_index
                ))
            })
        })
        .collect::<Result<_>>()?;

    if paths.is_empty() {
        return Err(StitchError::concatenation("no segments to join"));
    }

    let manifest_path = workspace.file("concat_manifest.txt");
    tokio::fs::write(&manifest_path, build_manifest(&paths))
        .await
        .map_err(|e| StitchError::Internal(anyhow::anyhow!(
            "failed to write concat manifest: {e}"
        )))?;

    match tokio::time::timeout(timeout, engine.concat(&manifest_path, output)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(StitchError::concatenation(e.to_string())),
        Err(_) => Err(StitchError::concatenation(format!(
            "timed out after {}s",
            timeout.as_secs()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_lists_segments_in_given_order() {
        let manifest = build_manifest(&[
            PathBuf::from("/ws/normalized_0.mp4"),
            PathBuf::from("/ws/normalized_1.mp4"),
            PathBuf::from("/ws/normalized_2.mp4"),
        ]);
        let lines: Vec<&str> = manifest.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "file '/ws/normalized_0.mp4'");
        assert_eq!(lines[2], "file '/ws/normalized_2.mp4'");
    }

    #[test]
    fn empty_manifest_is_empty() {
        assert!(build_manifest(&[]).is_empty());
    }
}
