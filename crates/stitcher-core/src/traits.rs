// Core traits for pluggable backends
//
// These traits keep the pipeline agnostic to its collaborators:
// - SessionStore: persisted session records (Postgres in production,
//   in-memory for tests)
// - ObjectStore: final-artifact hosting (HTTP object store, in-memory)
// - BgmLibrary: read-only background music catalog (filesystem, in-memory)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::Result;
use crate::session::Session;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Counts of sessions by status
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct SessionStats {
    pub total: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

/// Persisted session record store.
///
/// The session record is single-writer: only the owning pipeline task calls
/// `update` while the session is processing. Each update replaces the whole
/// record atomically so concurrent readers always observe a consistent
/// snapshot.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a newly created session
    async fn create(&self, session: &Session) -> Result<()>;

    /// Fetch a session snapshot
    async fn get(&self, id: Uuid) -> Result<Option<Session>>;

    /// List recent sessions, newest first
    async fn list(&self, limit: usize) -> Result<Vec<Session>>;

    /// Replace the session record atomically
    async fn update(&self, session: &Session) -> Result<()>;

    /// Delete a session record; returns false if it did not exist
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Counts by status for the stats endpoint
    async fn stats(&self) -> Result<SessionStats>;

    /// Retention sweep: delete terminal sessions last updated before the
    /// cutoff. Returns the number of records removed.
    async fn delete_terminal_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// External object store hosting the final artifact
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload the file at `path` under `key`, returning a durable URL
    async fn put(&self, key: &str, path: &Path) -> Result<String>;
}

/// One candidate background music track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgmTrack {
    pub path: PathBuf,
    pub category: String,
}

/// Read-only background music catalog indexed by category
#[async_trait]
pub trait BgmLibrary: Send + Sync {
    /// List candidate tracks. `category` filters case-insensitively by exact
    /// match; `None` returns the full library.
    async fn list(&self, category: Option<&str>) -> Result<Vec<BgmTrack>>;

    /// Distinct category names present in the library
    async fn categories(&self) -> Result<Vec<String>>;
}
