use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::{DisconnectJob, DisconnectReason};

#[derive(Debug, Clone)]
pub struct DisconnectRepository {
    pool: PgPool,
}

impl DisconnectRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Used by the plan-expiry job (spec.md §4.2) to enqueue directly —
    /// the QUOTA_EXCEEDED path is normally enqueued by the database
    /// trigger itself, not by application code.
    pub async fn enqueue(&self, username: &str, reason: DisconnectReason) -> Result<i64> {
        let inserted: Option<i64> = sqlx::query_scalar(
            "INSERT INTO disconnect_queue (username, reason)
             VALUES ($1, $2)
             ON CONFLICT (username) WHERE processed = false DO NOTHING
             RETURNING id",
        )
        .bind(username)
        .bind(reason)
        .fetch_optional(&self.pool)
        .await
        .context("failed to enqueue disconnect job")?;

        match inserted {
            Some(id) => Ok(id),
            // Partial unique index already suppressed a duplicate insert
            // (spec.md §4.2) — return the existing unprocessed job's id.
            None => sqlx::query_scalar(
                "SELECT id FROM disconnect_queue WHERE username = $1 AND processed = false",
            )
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .context("failed to fetch existing disconnect job after conflict"),
        }
    }

    pub async fn fetch(&self, id: i64) -> Result<Option<DisconnectJob>> {
        sqlx::query_as::<_, DisconnectJob>("SELECT * FROM disconnect_queue WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch disconnect job")
    }

    /// Fallback poll path (spec.md §9 REDESIGN FLAG): disabled by default,
    /// used only if the notification listener falls behind or the
    /// feature flag enabling it is set.
    pub async fn poll_unprocessed(&self, limit: i64) -> Result<Vec<DisconnectJob>> {
        sqlx::query_as::<_, DisconnectJob>(
            "SELECT * FROM disconnect_queue WHERE processed = false ORDER BY created_at ASC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("failed to poll disconnect queue")
    }

    pub async fn mark_processed(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE disconnect_queue SET processed = true, processed_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to mark disconnect job processed")?;
        Ok(())
    }

    pub async fn increment_attempts(&self, id: i64) -> Result<i32> {
        let attempts: i32 = sqlx::query_scalar(
            "UPDATE disconnect_queue SET attempts = attempts + 1 WHERE id = $1 RETURNING attempts",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .context("failed to increment disconnect job attempts")?;
        Ok(attempts)
    }

    /// spec.md §8 invariant: no pending job older than
    /// `max(retry_backoffs) + safety_margin` remains unprocessed.
    pub async fn count_overdue(&self, max_age: chrono::Duration) -> Result<i64> {
        let cutoff = chrono::Utc::now() - max_age;
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM disconnect_queue WHERE processed = false AND created_at < $1",
        )
        .bind(cutoff)
        .fetch_one(&self.pool)
        .await
        .context("failed to count overdue disconnect jobs")
    }
}
