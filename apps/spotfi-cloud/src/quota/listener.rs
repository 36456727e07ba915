//! Postgres LISTEN/NOTIFY consumer (spec.md §9 REDESIGN FLAG: "dispatch
//! disconnect jobs via LISTEN/NOTIFY instead of polling the queue table
//! every few seconds", target latency under 100ms from trigger to
//! dispatch). `trg_usage_exhaustion` and the plan-expiry job both issue
//! `pg_notify('disconnect_jobs', id)` after inserting a row.

use std::time::Duration;

use sqlx::postgres::PgListener;
use tracing::{error, info, warn};

use crate::quota::worker::DisconnectWorkerPool;

pub const CHANNEL: &str = "disconnect_jobs";

pub struct NotificationListener;

impl NotificationListener {
    /// Runs for the lifetime of the process. Reconnects the listener on
    /// error rather than giving up — a dropped LISTEN connection must
    /// never silently stop disconnect dispatch.
    pub async fn run(database_url: String, pool: std::sync::Arc<DisconnectWorkerPool>) {
        loop {
            match Self::listen_until_error(&database_url, &pool).await {
                Ok(()) => {}
                Err(e) => warn!(error = %e, "notification listener dropped, reconnecting"),
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    async fn listen_until_error(database_url: &str, pool: &DisconnectWorkerPool) -> anyhow::Result<()> {
        let mut listener = PgListener::connect(database_url).await?;
        listener.listen(CHANNEL).await?;
        info!(channel = CHANNEL, "listening for disconnect job notifications");

        loop {
            let notification = listener.recv().await?;
            match notification.payload().parse::<i64>() {
                Ok(job_id) => pool.submit(job_id).await,
                Err(e) => error!(payload = notification.payload(), error = %e, "malformed disconnect_jobs notification payload"),
            }
        }
    }
}
