// Repository layer for database operations

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use stitcher_core::{Session, SessionStats};

use crate::models::SessionRow;

const SESSION_COLUMNS: &str =
    "id, status, progress, message, request, artifact_url, error, created_at, updated_at";

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create database connection from URL
    pub async fn from_url(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn insert_session(&self, session: &Session) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO stitch_sessions (id, status, progress, message, request, artifact_url, error, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(session.id)
        .bind(session.status.to_string())
        .bind(i16::from(session.progress))
        .bind(&session.message)
        .bind(serde_json::to_value(&session.request)?)
        .bind(&session.artifact_url)
        .bind(session.error.as_ref().map(serde_json::to_value).transpose()?)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_session(&self, id: Uuid) -> Result<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM stitch_sessions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Session::try_from).transpose()
    }

    pub async fn list_sessions(&self, limit: i64) -> Result<Vec<Session>> {
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM stitch_sessions ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Session::try_from).collect()
    }

    /// Replace the whole session record. The single UPDATE keeps each
    /// snapshot atomic for concurrent readers.
    pub async fn update_session(&self, session: &Session) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE stitch_sessions
            SET status = $2,
                progress = $3,
                message = $4,
                artifact_url = $5,
                error = $6,
                updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(session.id)
        .bind(session.status.to_string())
        .bind(i16::from(session.progress))
        .bind(&session.message)
        .bind(&session.artifact_url)
        .bind(session.error.as_ref().map(serde_json::to_value).transpose()?)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn delete_session(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM stitch_sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn session_stats(&self) -> Result<SessionStats> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS count FROM stitch_sessions GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut stats = SessionStats::default();
        for row in rows {
            let status: String = row.try_get("status")?;
            let count: i64 = row.try_get("count")?;
            let count = count as u64;
            stats.total += count;
            match status.as_str() {
                "completed" => stats.completed += count,
                "failed" => stats.failed += count,
                _ => stats.processing += count,
            }
        }
        Ok(stats)
    }

    /// Delete terminal sessions last updated before the cutoff
    pub async fn delete_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM stitch_sessions
            WHERE status IN ('completed', 'failed') AND updated_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
