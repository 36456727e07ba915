//! Router reconciliation (spec.md §4.2 "Router reconciliation"): when a
//! router comes back online (or the liveness sweeper promotes it to
//! OFFLINE), compare its actual client list against our session table
//! and close whatever sessions the router no longer reports.
//!
//! Shaped after `edge::xtunnel`'s registry-plus-channel split: a cheap
//! queue handle any task can enqueue into, and a single consumer loop
//! owning the real work.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tracing::{info, warn};

use spotfi_db::repositories::SessionRepository;
use spotfi_shared::rpc;

use crate::edge::rpc::EdgeRpcClient;

/// At most 5 reconciliations run concurrently, and router_list/remove
/// RPCs are never issued faster than 10/s across the whole pool
/// (spec.md §4.2).
const MAX_CONCURRENT: usize = 5;
const MIN_JOB_SPACING: Duration = Duration::from_millis(100);

pub struct ReconcileQueue {
    sender: mpsc::Sender<String>,
}

impl ReconcileQueue {
    pub fn start(rpc: EdgeRpcClient, sessions: SessionRepository) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel(1024);
        tokio::spawn(run(receiver, rpc, sessions));
        Arc::new(Self { sender })
    }

    pub async fn enqueue(&self, router_id: String) {
        if self.sender.send(router_id.clone()).await.is_err() {
            warn!(router_id, "reconcile queue consumer gone, dropping job");
        }
    }
}

async fn run(mut receiver: mpsc::Receiver<String>, rpc: EdgeRpcClient, sessions: SessionRepository) {
    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT));
    let mut pacing = tokio::time::interval(MIN_JOB_SPACING);

    while let Some(router_id) = receiver.recv().await {
        pacing.tick().await;
        let permit = semaphore.clone().acquire_owned().await.expect("semaphore never closed");
        let rpc = rpc.clone();
        let sessions = sessions.clone();
        tokio::spawn(async move {
            let _permit = permit;
            reconcile_one(&router_id, &rpc, &sessions).await;
        });
    }
}

async fn reconcile_one(router_id: &str, rpc: &EdgeRpcClient, sessions: &SessionRepository) {
    let open = match sessions.open_sessions_for_router(router_id).await {
        Ok(sessions) => sessions,
        Err(e) => {
            warn!(router_id, error = %e, "reconcile: failed to load open sessions");
            return;
        }
    };
    if open.is_empty() {
        return;
    }

    let request = rpc::client_list(rpc.instance_id());
    let reported: HashSet<String> = match rpc.call(router_id, request).await {
        Ok(response) => response
            .result
            .and_then(|v| v.get("clients").cloned())
            .and_then(|v| v.as_array().cloned())
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| v.as_str().map(|s| s.to_uppercase()))
            .collect(),
        Err(e) => {
            // Router unreachable: nothing to reconcile against, leave the
            // sessions open for the stale-session sweeper to eventually
            // resolve (spec.md §4.2 "Stale session sweeper").
            warn!(router_id, error = %e, "reconcile: client_list rpc failed");
            return;
        }
    };

    for session in open {
        let still_present = session
            .calling_station_id
            .as_deref()
            .map(|mac| reported.contains(&mac.to_uppercase()))
            .unwrap_or(true);
        if still_present {
            continue;
        }
        if let Err(e) = sessions.close(&session.acct_unique_id, "Lost-Carrier").await {
            warn!(router_id, acct_unique_id = session.acct_unique_id, error = %e, "reconcile: failed to close ghost session");
        } else {
            info!(router_id, acct_unique_id = session.acct_unique_id, "reconcile: closed session absent from router's client list");
        }
    }
}
