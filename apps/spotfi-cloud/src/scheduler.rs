//! Periodic job scheduler (spec.md §4.2): spawns the background loops
//! the quota engine and presence tracker need, each on its own fixed
//! interval. Event-driven work (disconnect dispatch via LISTEN/NOTIFY,
//! reconciliation triggered by presence transitions) is started
//! separately — this only owns the "every N minutes/hours" jobs.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use spotfi_db::repositories::DisconnectRepository;

use crate::edge::presence::PresenceHandler;
use crate::edge::xtunnel::XTunnelRegistry;
use crate::quota::worker::DisconnectWorkerPool;
use crate::quota::{PlanExpiryJob, StaleSessionSweeper};

const LIVENESS_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const XTUNNEL_REAP_INTERVAL: Duration = Duration::from_secs(30);
/// spec.md §8 invariant: no pending disconnect job outlives the longest
/// retry chain (8s backoff + margin) while unprocessed, unless the
/// fallback poller is disabled entirely.
const POLL_FALLBACK_INTERVAL: Duration = Duration::from_secs(30);
const POLL_FALLBACK_BATCH: i64 = 100;

pub struct Scheduler {
    presence: Arc<PresenceHandler>,
    sweeper: StaleSessionSweeper,
    expiry: PlanExpiryJob,
    disconnects: DisconnectRepository,
    worker_pool: Arc<DisconnectWorkerPool>,
    xtunnel: Arc<XTunnelRegistry>,
    poll_fallback_enabled: bool,
}

impl Scheduler {
    pub fn new(
        presence: Arc<PresenceHandler>,
        sweeper: StaleSessionSweeper,
        expiry: PlanExpiryJob,
        disconnects: DisconnectRepository,
        worker_pool: Arc<DisconnectWorkerPool>,
        xtunnel: Arc<XTunnelRegistry>,
        poll_fallback_enabled: bool,
    ) -> Self {
        Self { presence, sweeper, expiry, disconnects, worker_pool, xtunnel, poll_fallback_enabled }
    }

    /// Spawns every periodic loop and returns immediately; each loop runs
    /// for the lifetime of the process.
    pub fn spawn_all(self) {
        let presence = self.presence.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(LIVENESS_SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                presence.sweep_expired_liveness().await;
            }
        });

        tokio::spawn(self.sweeper.run());
        tokio::spawn(self.expiry.run());

        let xtunnel = self.xtunnel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(XTUNNEL_REAP_INTERVAL);
            loop {
                ticker.tick().await;
                xtunnel.reap_idle().await;
            }
        });

        if self.poll_fallback_enabled {
            info!("quota poll fallback enabled: disconnect queue will also be polled directly");
            let disconnects = self.disconnects;
            let worker_pool = self.worker_pool;
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(POLL_FALLBACK_INTERVAL);
                loop {
                    ticker.tick().await;
                    match disconnects.poll_unprocessed(POLL_FALLBACK_BATCH).await {
                        Ok(jobs) => {
                            for job in jobs {
                                worker_pool.submit(job.id).await;
                            }
                        }
                        Err(e) => warn!(error = %e, "poll fallback: failed to poll disconnect queue"),
                    }
                }
            });
        }
    }
}
