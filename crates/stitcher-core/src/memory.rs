// In-memory implementations for examples and testing
//
// These keep all data in memory, making them the backend for pipeline unit
// tests and quick prototyping without Postgres or an object store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;
use crate::session::{Session, SessionStatus};
use crate::traits::{BgmLibrary, BgmTrack, ObjectStore, SessionStats, SessionStore};

// ============================================================================
// InMemorySessionStore
// ============================================================================

/// In-memory session store keyed by session ID.
///
/// `update` replaces the whole record under the write lock, so readers see
/// either the previous or the new snapshot, never a partial write.
#[derive(Debug, Default, Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all sessions
    pub async fn clear(&self) {
        self.sessions.write().await.clear();
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, session: &Session) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Session>> {
        Ok(self.sessions.read().await.get(&id).cloned())
    }

    async fn list(&self, limit: usize) -> Result<Vec<Session>> {
        let mut sessions: Vec<Session> = self.sessions.read().await.values().cloned().collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sessions.truncate(limit);
        Ok(sessions)
    }

    async fn update(&self, session: &Session) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.sessions.write().await.remove(&id).is_some())
    }

    async fn stats(&self) -> Result<SessionStats> {
        let sessions = self.sessions.read().await;
        let mut stats = SessionStats {
            total: sessions.len() as u64,
            ..Default::default()
        };
        for session in sessions.values() {
            match session.status {
                SessionStatus::Processing => stats.processing += 1,
                SessionStatus::Completed => stats.completed += 1,
                SessionStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }

    async fn delete_terminal_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !(s.status.is_terminal() && s.updated_at < cutoff));
        Ok((before - sessions.len()) as u64)
    }
}

// ============================================================================
// InMemoryObjectStore
// ============================================================================

/// Object store that records uploads and fabricates durable URLs
#[derive(Debug, Default, Clone)]
pub struct InMemoryObjectStore {
    uploads: Arc<RwLock<HashMap<String, PathBuf>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys uploaded so far, for assertions in tests
    pub async fn keys(&self) -> Vec<String> {
        self.uploads.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, key: &str, path: &Path) -> Result<String> {
        self.uploads
            .write()
            .await
            .insert(key.to_string(), path.to_path_buf());
        Ok(format!("memory://artifacts/{key}"))
    }
}

// ============================================================================
// InMemoryBgmLibrary
// ============================================================================

/// BGM catalog backed by a fixed track list
#[derive(Debug, Default, Clone)]
pub struct InMemoryBgmLibrary {
    tracks: Vec<BgmTrack>,
}

impl InMemoryBgmLibrary {
    pub fn new(tracks: Vec<BgmTrack>) -> Self {
        Self { tracks }
    }

    /// An empty library, for exercising the BgmUnavailable path
    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BgmLibrary for InMemoryBgmLibrary {
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
    use crate::session::{Mode, StitchRequest, VideoItem};
    use chrono::Duration as ChronoDuration;

    fn request() -> StitchRequest {
        StitchRequest {
            videos: vec![VideoItem {
                url: "https://cdn.example.com/a.mp4".to_string(),
                sequence: 0,
            }],
            voice_url: None,
            voice_volume: 1.0,
            mode: Mode::Portrait,
            bgm_enabled: false,
            bgm_category: None,
            bgm_volume: 0.3,
        }
    }

    #[tokio::test]
    async fn session_crud_round_trip() {
        let store = InMemorySessionStore::new();
        let session = Session::new(request());
        let id = session.id;

        store.create(&session).await.unwrap();
        assert!(store.get(id).await.unwrap().is_some());
        assert_eq!(store.list(10).await.unwrap().len(), 1);
        assert!(store.delete(id).await.unwrap());
        assert!(!store.delete(id).await.unwrap());
        assert!(store.get(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stats_count_by_status() {
        let store = InMemorySessionStore::new();

        let processing = Session::new(request());
        store.create(&processing).await.unwrap();

        let mut completed = Session::new(request());
        completed.complete("memory://artifacts/x");
        store.create(&completed).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.processing, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test]
    async fn retention_sweep_only_removes_old_terminal_sessions() {
        let store = InMemorySessionStore::new();

        let mut old_completed = Session::new(request());
        old_completed.complete("memory://artifacts/x");
        old_completed.updated_at = Utc::now() - ChronoDuration::days(8);
        store.create(&old_completed).await.unwrap();

        let mut old_processing = Session::new(request());
        old_processing.updated_at = Utc::now() - ChronoDuration::days(8);
        store.create(&old_processing).await.unwrap();

        let mut fresh_failed = Session::new(request());
        fresh_failed.fail(&crate::error::StitchError::upload("x"));
        store.create(&fresh_failed).await.unwrap();

        let cutoff = Utc::now() - ChronoDuration::days(7);
        let removed = store.delete_terminal_older_than(cutoff).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.get(old_processing.id).await.unwrap().is_some());
        assert!(store.get(fresh_failed.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn bgm_category_filter_is_case_insensitive() {
        let library = InMemoryBgmLibrary::new(vec![
            BgmTrack {
                path: PathBuf::from("/bgm/happy/one.mp3"),
                category: "Happy".to_string(),
            },
            BgmTrack {
                path: PathBuf::from("/bgm/calm/two.mp3"),
                category: "calm".to_string(),
            },
        ]);

        assert_eq!(library.list(Some("happy")).await.unwrap().len(), 1);
        assert_eq!(library.list(Some("CALM")).await.unwrap().len(), 1);
        assert_eq!(library.list(None).await.unwrap().len(), 2);
        assert!(library.list(Some("unknown")).await.unwrap().is_empty());
    }
}
