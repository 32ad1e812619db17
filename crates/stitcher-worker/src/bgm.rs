// Background music selection
//
// An unknown or empty category degrades to the unfiltered pool rather than
// failing, preserving availability. The only failure mode is an entirely
// empty library.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use stitcher_core::{BgmLibrary, BgmTrack, Result, StitchError};

/// Audio file extensions recognized when scanning a filesystem library
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "aac", "ogg"];

/// Pick one track uniformly at random from the candidate pool.
///
/// Returns `None` when BGM is disabled; `BgmUnavailable` only when the
/// library holds no tracks at all.
pub async fn select_track(
    library: &dyn BgmLibrary,
    enabled: bool,
    category: Option<&str>,
) -> Result<Option<BgmTrack>> {
    if !enabled {
        return Ok(None);
    }

    let mut pool = library.list(category).await?;
    if pool.is_empty() {
        if let Some(cat) = category {
            warn!(category = cat, "No BGM in category, falling back to full library");
        }
        pool = library.list(None).await?;
    }
    if pool.is_empty() {
        return Err(StitchError::BgmUnavailable);
    }

    let track = pool
        .choose(&mut rand::thread_rng())
        .cloned()
        .ok_or(StitchError::BgmUnavailable)?;
    debug!(track = %track.path.display(), category = %track.category, "Selected BGM track");
    Ok(Some(track))
}

/// Filesystem-backed BGM catalog.
///
/// The category of a track is the name of its parent directory, mirroring a
/// library laid out as `<root>/<category>/<track>.mp3`.
#[derive(Debug, Clone)]
pub struct FsBgmLibrary {
    tracks: Vec<BgmTrack>,
}

impl FsBgmLibrary {
    /// Scan the library root once at startup. A missing root yields an
    /// empty library, not an error.
    pub async fn scan(root: &Path) -> Result<Self> {
        let mut tracks = Vec::new();
        let mut pending = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(StitchError::Internal(anyhow::anyhow!(
                        "failed to read BGM directory {}: {e}",
                        dir.display()
                    )))
                }
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StitchError::Internal(e.into()))?
            {
                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                    continue;
                }
                let is_audio = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| AUDIO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                    .unwrap_or(false);
                if !is_audio {
                    continue;
                }
                let category = path
                    .parent()
                    .and_then(|p| p.file_name())
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                tracks.push(BgmTrack { path, category });
            }
        }

        debug!(count = tracks.len(), root = %root.display(), "BGM library scanned");
        Ok(Self { tracks })
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}

#[async_trait]
impl BgmLibrary for FsBgmLibrary {
    async fn list(&self, category: Option<&str>) -> Result<Vec<BgmTrack>> {
        match category {
            Some(cat) => Ok(self
                .tracks
                .iter()
                .filter(|t| t.category.eq_ignore_ascii_case(cat))
                .cloned()
                .collect()),
            None => Ok(self.tracks.clone()),
        }
    }

    async fn categories(&self) -> Result<Vec<String>> {
        let mut categories: Vec<String> =
            self.tracks.iter().map(|t| t.category.clone()).collect();
        categories.sort();
        categories.dedup();
        Ok(categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stitcher_core::InMemoryBgmLibrary;

    fn library() -> InMemoryBgmLibrary {
        InMemoryBgmLibrary::new(vec![
            BgmTrack {
                path: PathBuf::from("/bgm/happy/one.mp3"),
                category: "happy".to_string(),
            },
            BgmTrack {
                path: PathBuf::from("/bgm/happy/two.mp3"),
                category: "happy".to_string(),
            },
            BgmTrack {
                path: PathBuf::from("/bgm/calm/three.mp3"),
                category: "calm".to_string(),
            },
        ])
    }

    #[tokio::test]
    async fn disabled_bgm_selects_nothing() {
        let selected = select_track(&library(), false, Some("happy")).await.unwrap();
        assert!(selected.is_none());
    }

    #[tokio::test]
    async fn category_filter_limits_the_pool() {
        for _ in 0..20 {
            let track = select_track(&library(), true, Some("calm"))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(track.category, "calm");
        }
    }

    #[tokio::test]
    async fn unknown_category_falls_back_to_full_pool() {
        let track = select_track(&library(), true, Some("no-such-category"))
            .await
            .unwrap()
            .unwrap();
        assert!(["happy", "calm"].contains(&track.category.as_str()));
    }

    #[tokio::test]
    async fn empty_library_is_the_only_failure() {
        let err = select_track(&InMemoryBgmLibrary::empty(), true, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "BgmUnavailableError");
    }

    #[tokio::test]
    async fn fs_scan_reads_categories_from_directory_names() {
        let root = tempfile::tempdir().unwrap();
        let happy = root.path().join("happy");
        let calm = root.path().join("calm");
        tokio::fs::create_dir_all(&happy).await.unwrap();
        tokio::fs::create_dir_all(&calm).await.unwrap();
        tokio::fs::write(happy.join("one.mp3"), b"x").await.unwrap();
        tokio::fs::write(happy.join("two.WAV"), b"x").await.unwrap();
        tokio::fs::write(calm.join("three.ogg"), b"x").await.unwrap();
        tokio::fs::write(calm.join("notes.txt"), b"x").await.unwrap();

        let library = FsBgmLibrary::scan(root.path()).await.unwrap();
        assert_eq!(library.track_count(), 3);
        assert_eq!(
            library.categories().await.unwrap(),
            vec!["calm".to_string(), "happy".to_string()]
        );
        assert_eq!(library.list(Some("HAPPY")).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn fs_scan_of_missing_root_is_empty() {
        let root = tempfile::tempdir().unwrap();
        let library = FsBgmLibrary::scan(&root.path().join("missing")).await.unwrap();
        assert_eq!(library.track_count(), 0);
    }
}
