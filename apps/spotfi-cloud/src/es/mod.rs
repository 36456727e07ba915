//! Ephemeral Store (spec.md §2 "ES"): TTL keys for router liveness and
//! fixed-window counters for portal rate limiting. Grounded on the
//! teacher's `redis_service.rs`, updated to the `redis` crate's own
//! `ConnectionManager` (the dependency the newer panel crate already
//! carries) instead of a `bb8` pool.

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::info;

#[derive(Clone)]
pub struct EphemeralStore {
    conn: ConnectionManager,
}

impl EphemeralStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("invalid REDIS_URL")?;
        let conn = client
            .get_connection_manager()
            .await
            .context("failed to connect to redis")?;
        info!("ephemeral store connected");
        Ok(Self { conn })
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await.context("redis GET failed")?;
        Ok(value)
    }

    /// Router liveness key (spec.md §4.1 "Presence"): set with a TTL,
    /// refreshed on every ONLINE/heartbeat, naturally expiring if the
    /// router stops refreshing it.
    pub async fn set_with_ttl(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(key, value, ttl_seconds)
            .await
            .context("redis SETEX failed")?;
        Ok(())
    }

    pub async fn del(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await.context("redis DEL failed")?;
        Ok(())
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(key).await.context("redis EXISTS failed")?;
        Ok(exists)
    }

    /// Fixed-window rate limiter used by the portal login guard
    /// (spec.md §4.3: "5 attempts / 15 min; block duration: 30 min").
    /// Returns `true` if the caller is still under the limit.
    pub async fn check_rate_limit(&self, key: &str, limit: u64, window_secs: u64) -> Result<bool> {
        let mut conn = self.conn.clone();
        let count: u64 = conn.incr(key, 1u64).await.context("redis INCR failed")?;
        if count == 1 {
            let _: () = conn
                .expire(key, window_secs as i64)
                .await
                .context("redis EXPIRE failed")?;
        }
        Ok(count <= limit)
    }

    pub fn router_liveness_key(router_id: &str) -> String {
        format!("router:{router_id}:status")
    }
}
