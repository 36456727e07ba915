//! Disconnect worker pool (spec.md §4.2 "Disconnect dispatch"). Consumes
//! job ids handed over by `listener` (or, in polling fallback mode, by
//! the scheduler) and, for each: publishes `uspot.client_remove` to the
//! router if it's online, upserts the RADIUS reject rule, and closes the
//! session rows. On failure, retries up to 3 times with 2s/4s/8s backoff
//! before giving up and marking the job processed anyway (spec.md §7:
//! never let a botched router RPC wedge the queue forever).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info, warn};

use spotfi_db::models::DisconnectJob;
use spotfi_db::repositories::{DisconnectRepository, RadiusRepository, RouterRepository, SessionRepository};
use spotfi_shared::rpc;

use crate::edge::correlation::RpcError;
use crate::edge::rpc::EdgeRpcClient;

const MAX_CONCURRENT: usize = 20;
const MAX_JOBS_PER_SEC: u64 = 100;
const RETRY_BACKOFFS: [Duration; 3] = [Duration::from_secs(2), Duration::from_secs(4), Duration::from_secs(8)];

#[derive(Clone)]
struct Deps {
    rpc: EdgeRpcClient,
    disconnects: DisconnectRepository,
    sessions: SessionRepository,
    routers: RouterRepository,
    radius: RadiusRepository,
}

pub struct DisconnectWorkerPool {
    sender: mpsc::Sender<i64>,
}

impl DisconnectWorkerPool {
    pub fn start(
        rpc: EdgeRpcClient,
        disconnects: DisconnectRepository,
        sessions: SessionRepository,
        routers: RouterRepository,
        radius: RadiusRepository,
    ) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel(4096);
        let deps = Deps { rpc, disconnects, sessions, routers, radius };
        tokio::spawn(run(receiver, deps));
        Arc::new(Self { sender })
    }

    /// Hands a `disconnect_queue.id` to the pool. Used by both the
    /// LISTEN/NOTIFY path and the disabled-by-default polling fallback.
    pub async fn submit(&self, job_id: i64) {
        if self.sender.send(job_id).await.is_err() {
            warn!(job_id, "disconnect worker pool gone, dropping job");
        }
    }
}

async fn run(mut receiver: mpsc::Receiver<i64>, deps: Deps) {
    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT));
    let mut pacing = tokio::time::interval(Duration::from_millis(1000 / MAX_JOBS_PER_SEC));

    while let Some(job_id) = receiver.recv().await {
        pacing.tick().await;
        let permit = semaphore.clone().acquire_owned().await.expect("semaphore never closed");
        let deps = deps.clone();
        tokio::spawn(async move {
            let _permit = permit;
            process_with_retries(job_id, &deps).await;
        });
    }
}

async fn process_with_retries(job_id: i64, deps: &Deps) {
    for (attempt, backoff) in std::iter::once(Duration::ZERO).chain(RETRY_BACKOFFS).enumerate() {
        if attempt > 0 {
            tokio::time::sleep(backoff).await;
        }
        match process_once(job_id, deps).await {
            Ok(()) => return,
            Err(e) => {
                warn!(job_id, attempt, error = %e, "disconnect job attempt failed");
                if let Err(e) = deps.disconnects.increment_attempts(job_id).await {
                    warn!(job_id, error = %e, "failed to record disconnect job attempt");
                }
            }
        }
    }

    error!(job_id, "disconnect job exhausted retries, marking processed to avoid wedging the queue");
    if let Err(e) = deps.disconnects.mark_processed(job_id).await {
        error!(job_id, error = %e, "failed to mark exhausted disconnect job processed");
    }
}

async fn process_once(job_id: i64, deps: &Deps) -> anyhow::Result<()> {
    let job: DisconnectJob = deps
        .disconnects
        .fetch(job_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("disconnect job {job_id} vanished"))?;

    if job.processed {
        return Ok(());
    }

    deps.radius.upsert_reject(&job.username).await?;

    let open_sessions = deps.sessions.open_sessions_for_user(&job.username).await?;
    for session in &open_sessions {
        let Some(router_id) = session.router_id.clone() else {
            // No router association on record — nothing to tell the edge,
            // but the session row can still be closed locally.
            deps.sessions.close(&session.acct_unique_id, terminate_cause(job.reason)).await?;
            continue;
        };

        let accepted = remove_client_if_online(&router_id, session.calling_station_id.as_deref(), deps).await;
        if accepted {
            deps.sessions.close(&session.acct_unique_id, terminate_cause(job.reason)).await?;
        } else {
            // Router didn't confirm removal; leave the session open and
            // let reconciliation (or the stale sweeper) clean it up once
            // the router's own client list catches up.
            info!(router_id, username = job.username, "disconnect: router did not confirm removal, deferring to reconciliation");
        }
    }

    deps.disconnects.mark_processed(job_id).await?;
    info!(job_id, username = job.username, reason = ?job.reason, "disconnect job processed");
    Ok(())
}

/// Returns `true` if the router is online and confirmed the removal (or
/// isn't online, in which case there's nothing to confirm and the
/// session is closed on our say-so alone).
async fn remove_client_if_online(router_id: &str, mac: Option<&str>, deps: &Deps) -> bool {
    let router = match deps.routers.find_by_id(router_id).await {
        Ok(Some(r)) => r,
        Ok(None) => return true,
        Err(e) => {
            warn!(router_id, error = %e, "disconnect: failed to load router, assuming offline");
            return true;
        }
    };
    if router.status != spotfi_db::models::RouterStatus::Online {
        return true;
    }

    let Some(mac) = mac else { return true };
    let request = rpc::client_remove(deps.rpc.instance_id(), mac);
    match deps.rpc.call(router_id, request).await {
        Ok(_) => true,
        Err(RpcError::RouterBusy | RpcError::Timeout) => false,
        Err(RpcError::BrokerUnavailable | RpcError::RouterNotConnected) => true,
    }
}

fn terminate_cause(reason: spotfi_db::models::DisconnectReason) -> &'static str {
    match reason {
        spotfi_db::models::DisconnectReason::QuotaExceeded => "Admin-Reset",
        spotfi_db::models::DisconnectReason::PlanExpired => "Admin-Reset",
    }
}
