// Database models (internal, may differ from public DTOs)

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use stitcher_core::{Session, SessionStatus};

/// Row shape of the stitch_sessions table
#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub id: Uuid,
    pub status: String,
    pub progress: i16,
    pub message: String,
    pub request: sqlx::types::JsonValue,
    pub artifact_url: Option<String>,
    pub error: Option<sqlx::types::JsonValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for Session {
    type Error = anyhow::Error;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Session {
            id: row.id,
            status: SessionStatus::from(row.status.as_str()),
            progress: row.progress.clamp(0, 100) as u8,
            message: row.message,
            request: serde_json::from_value(row.request)?,
            artifact_url: row.artifact_url,
            error: row.error.map(serde_json::from_value).transpose()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
