use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::UsageCounter;

#[derive(Debug, Clone)]
pub struct UsageRepository {
    pool: PgPool,
}

impl UsageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Materialized projection maintained by triggers (spec.md §4.2); the
    /// cloud only ever reads it, never writes it directly.
    pub async fn counter(&self, username: &str, period_key: &str) -> Result<i64> {
        let row: Option<UsageCounter> = sqlx::query_as::<_, UsageCounter>(
            "SELECT * FROM usage_counters WHERE username = $1 AND period_key = $2",
        )
        .bind(username)
        .bind(period_key)
        .fetch_optional(&self.pool)
        .await
        .context("failed to fetch usage counter")?;
        Ok(row.map(|r| r.bytes_total).unwrap_or(0))
    }

    /// `totalUsage(user)` from spec.md §4.2: the closed-session counter
    /// plus the (bounded, O(1)) set of this user's still-open sessions.
    pub async fn total_usage(&self, username: &str, period_key: &str) -> Result<i64> {
        let closed = self.counter(username, period_key).await?;
        let open: Option<i64> = sqlx::query_scalar(
            "SELECT COALESCE(SUM(acct_input_octets + acct_output_octets), 0)
             FROM sessions WHERE username = $1 AND acct_stop_time IS NULL",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .context("failed to sum open session usage")?;
        Ok(closed + open.unwrap_or(0))
    }
}
