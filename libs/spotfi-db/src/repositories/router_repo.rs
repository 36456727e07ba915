use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::{Router, RouterDailyUsage, RouterStatus};

#[derive(Debug, Clone)]
pub struct RouterRepository {
    pool: PgPool,
}

impl RouterRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Router>> {
        sqlx::query_as::<_, Router>("SELECT * FROM routers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch router by id")
    }

    pub async fn find_by_token(&self, token: &str) -> Result<Option<Router>> {
        sqlx::query_as::<_, Router>("SELECT * FROM routers WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch router by token")
    }

    /// Router identity resolution step 1 (spec.md §4.3): exact match on
    /// the pre-normalized MAC column. Most reliable; tried first.
    pub async fn find_by_mac(&self, normalized_mac: &str) -> Result<Option<Router>> {
        sqlx::query_as::<_, Router>("SELECT * FROM routers WHERE mac_address = $1")
            .bind(normalized_mac)
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch router by mac")
    }

    /// Step 2: exact-or-substring match on the normalized name.
    pub async fn find_by_normalized_name(&self, normalized_name: &str) -> Result<Option<Router>> {
        sqlx::query_as::<_, Router>(
            "SELECT * FROM routers WHERE normalized_name = $1
             OR normalized_name LIKE '%' || $1 || '%'
             ORDER BY (normalized_name = $1) DESC LIMIT 1",
        )
        .bind(normalized_name)
        .fetch_optional(&self.pool)
        .await
        .context("failed to fetch router by name")
    }

    /// Step 3: exact match on the stored NAS IP.
    pub async fn find_by_nas_ip(&self, ip: &str) -> Result<Option<Router>> {
        sqlx::query_as::<_, Router>("SELECT * FROM routers WHERE nas_ip_address = $1")
            .bind(ip)
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch router by nas ip")
    }

    /// Bulk-merged status/lastSeen update (spec.md §5 "Shared-resource
    /// policy" — never written on every individual heartbeat).
    pub async fn mark_online_batch(&self, router_ids: &[String]) -> Result<()> {
        if router_ids.is_empty() {
            return Ok(());
        }
        sqlx::query(
            "UPDATE routers SET status = 'ONLINE', last_seen = now()
             WHERE id = ANY($1)",
        )
        .bind(router_ids)
        .execute(&self.pool)
        .await
        .context("failed to mark routers online")?;
        Ok(())
    }

    pub async fn set_status(&self, id: &str, status: RouterStatus) -> Result<()> {
        sqlx::query("UPDATE routers SET status = $1 WHERE id = $2")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to set router status")?;
        Ok(())
    }

    pub async fn set_status_with_last_seen(
        &self,
        id: &str,
        status: RouterStatus,
        last_seen: chrono::DateTime<chrono::Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE routers SET status = $1, last_seen = $2 WHERE id = $3")
            .bind(status)
            .bind(last_seen)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to set router status and last_seen")?;
        Ok(())
    }

    pub async fn upsert_radius_client(
        &self,
        id: &str,
        nas_ip: &str,
        secret: &str,
        name: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO radius_nas_clients (nas_ip_address, identifier, secret)
             VALUES ($1, $2, $3)
             ON CONFLICT (nas_ip_address) DO UPDATE SET identifier = $2, secret = $3",
        )
        .bind(nas_ip)
        .bind(name)
        .bind(secret)
        .execute(&self.pool)
        .await
        .context("failed to upsert radius nas client")?;

        let _ = id;
        Ok(())
    }

    pub async fn list_stale_online(&self, ttl: chrono::Duration) -> Result<Vec<Router>> {
        let cutoff = chrono::Utc::now() - ttl;
        sqlx::query_as::<_, Router>(
            "SELECT * FROM routers WHERE status = 'ONLINE' AND (last_seen IS NULL OR last_seen < $1)",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .context("failed to list stale online routers")
    }

    pub async fn daily_usage(&self, router_id: &str, date: chrono::NaiveDate) -> Result<i64> {
        let row: Option<RouterDailyUsage> = sqlx::query_as::<_, RouterDailyUsage>(
            "SELECT * FROM router_daily_usage WHERE router_id = $1 AND usage_date = $2",
        )
        .bind(router_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .context("failed to fetch router daily usage")?;
        Ok(row.map(|r| r.bytes_total).unwrap_or(0))
    }
}
