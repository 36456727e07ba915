//! Stale session sweeper (spec.md §4.2 "Stale session sweeper"): every 5
//! minutes, closes any session whose last accounting update predates a
//! 10-minute staleness window, so a router that loses power mid-session
//! doesn't permanently pin a user's quota to "in use".

use std::time::Duration;

use tracing::{info, warn};

use spotfi_db::repositories::SessionRepository;

const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);
const STALENESS_WINDOW: chrono::Duration = chrono::Duration::minutes(10);

pub struct StaleSessionSweeper {
    sessions: SessionRepository,
}

impl StaleSessionSweeper {
    pub fn new(sessions: SessionRepository) -> Self {
        Self { sessions }
    }

    /// Runs forever on a fixed interval. Call via `tokio::spawn`.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            match self.sessions.close_stale(STALENESS_WINDOW).await {
                Ok(0) => {}
                Ok(n) => info!(closed = n, "stale session sweep closed sessions"),
                Err(e) => warn!(error = %e, "stale session sweep failed"),
            }
        }
    }
}
