use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::Session;

#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn open_sessions_for_user(&self, username: &str) -> Result<Vec<Session>> {
        sqlx::query_as::<_, Session>(
            "SELECT * FROM sessions WHERE username = $1 AND acct_stop_time IS NULL",
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch open sessions for user")
    }

    pub async fn open_sessions_for_router(&self, router_id: &str) -> Result<Vec<Session>> {
        sqlx::query_as::<_, Session>(
            "SELECT * FROM sessions WHERE router_id = $1 AND acct_stop_time IS NULL",
        )
        .bind(router_id)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch open sessions for router")
    }

    pub async fn close(
        &self,
        acct_unique_id: &str,
        terminate_cause: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE sessions SET acct_stop_time = now(), acct_terminate_cause = $1
             WHERE acct_unique_id = $2 AND acct_stop_time IS NULL",
        )
        .bind(terminate_cause)
        .bind(acct_unique_id)
        .execute(&self.pool)
        .await
        .context("failed to close session")?;
        Ok(())
    }

    /// Stale session sweeper (spec.md §4.2): closes sessions whose last
    /// update predates the staleness window, guarding against permanent
    /// quota lock-out when a router loses power mid-session.
    pub async fn close_stale(&self, older_than: chrono::Duration) -> Result<u64> {
        let cutoff = chrono::Utc::now() - older_than;
        let result = sqlx::query(
            "UPDATE sessions SET acct_stop_time = now(), acct_terminate_cause = 'Admin-Reset'
             WHERE acct_stop_time IS NULL AND COALESCE(acct_update_time, acct_start_time) < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .context("failed to close stale sessions")?;
        Ok(result.rows_affected())
    }

    pub async fn record_accounting_start(&self, session: &Session) -> Result<()> {
        sqlx::query(
            "INSERT INTO sessions (
                acct_unique_id, session_id, username, router_id, nas_ip_address,
                calling_station_id, framed_ip_address, acct_start_time, acct_update_time,
                acct_input_octets, acct_output_octets
             ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$8,0,0)
             ON CONFLICT (acct_unique_id) DO NOTHING",
        )
        .bind(&session.acct_unique_id)
        .bind(&session.session_id)
        .bind(&session.username)
        .bind(&session.router_id)
        .bind(&session.nas_ip_address)
        .bind(&session.calling_station_id)
        .bind(&session.framed_ip_address)
        .bind(session.acct_start_time)
        .execute(&self.pool)
        .await
        .context("failed to record accounting start")?;
        Ok(())
    }
}
