// Database-backed SessionStore implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use stitcher_core::{Result, Session, SessionStats, SessionStore, StitchError};

use crate::repositories::Database;

/// Postgres-backed session store
#[derive(Clone)]
pub struct DbSessionStore {
    db: Database,
}

impl DbSessionStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for DbSessionStore {
    async fn create(&self, session: &Session) -> Result<()> {
        self.db
            .insert_session(session)
            .await
            .map_err(StitchError::Internal)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Session>> {
        self.db.get_session(id).await.map_err(StitchError::Internal)
    }

    async fn list(&self, limit: usize) -> Result<Vec<Session>> {
        self.db
            .list_sessions(limit as i64)
            .await
            .map_err(StitchError::Internal)
    }

    async fn update(&self, session: &Session) -> Result<()> {
        self.db
            .update_session(session)
            .await
            .map_err(StitchError::Internal)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        self.db
            .delete_session(id)
            .await
            .map_err(StitchError::Internal)
    }

    async fn stats(&self) -> Result<SessionStats> {
        self.db.session_stats().await.map_err(StitchError::Internal)
    }

    async fn delete_terminal_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.db
            .delete_terminal_before(cutoff)
            .await
            .map_err(StitchError::Internal)
    }
}

/// Create a database-backed session store
pub fn create_db_session_store(db: Database) -> DbSessionStore {
    DbSessionStore::new(db)
}
