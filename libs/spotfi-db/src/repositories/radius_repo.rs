use anyhow::{Context, Result};
use sqlx::PgPool;

/// Writes the `check`/`reply` rows the external RADIUS service reads
/// (spec.md §6 "Persisted-state layout"). The cloud never speaks RADIUS
/// to routers directly — it only steers the shared service via these
/// tables.
#[derive(Debug, Clone)]
pub struct RadiusRepository {
    pool: PgPool,
}

impl RadiusRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// `Auth-Type := Reject` (spec.md §4.2 step 3): prevents reauthentication
    /// until an operator or the plan-renewal path clears it.
    pub async fn upsert_reject(&self, username: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO radius_check (username, attribute, op, value)
             VALUES ($1, 'Auth-Type', ':=', 'Reject')
             ON CONFLICT (username, attribute) DO UPDATE SET op = ':=', value = 'Reject'",
        )
        .bind(username)
        .execute(&self.pool)
        .await
        .context("failed to upsert radius reject rule")?;
        Ok(())
    }

    pub async fn clear_reject(&self, username: &str) -> Result<()> {
        sqlx::query("DELETE FROM radius_check WHERE username = $1 AND attribute = 'Auth-Type' AND value = 'Reject'")
            .bind(username)
            .execute(&self.pool)
            .await
            .context("failed to clear radius reject rule")?;
        Ok(())
    }

    /// Re-synchronizes a user's reply attributes to the aggregated
    /// remaining limits across their still-active plans (spec.md §4.2
    /// "Plan expiry"). `rate_limit` is whatever the RADIUS dictionary in
    /// use expects for the chosen attribute (opaque to the core).
    pub async fn upsert_reply(&self, username: &str, attribute: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO radius_reply (username, attribute, op, value)
             VALUES ($1, $2, ':=', $3)
             ON CONFLICT (username, attribute) DO UPDATE SET value = $3",
        )
        .bind(username)
        .bind(attribute)
        .bind(value)
        .execute(&self.pool)
        .await
        .context("failed to upsert radius reply attribute")?;
        Ok(())
    }
}
