//! Presence handling (spec.md §4.1 "Presence"). Reacts to
//! `spotfi/router/+/status` messages (both explicit publishes and LWT
//! firings look identical on the wire) and to heartbeat messages on
//! `spotfi/router/+/metrics`.

use std::sync::Arc;

use tracing::{info, warn};

use spotfi_db::models::RouterStatus;
use spotfi_db::repositories::RouterRepository;

use crate::es::EphemeralStore;
use crate::quota::reconciler::ReconcileQueue;

const LIVENESS_TTL_SECS: u64 = 90;

pub struct PresenceHandler {
    routers: RouterRepository,
    es: EphemeralStore,
    reconcile_queue: Arc<ReconcileQueue>,
}

impl PresenceHandler {
    pub fn new(routers: RouterRepository, es: EphemeralStore, reconcile_queue: Arc<ReconcileQueue>) -> Self {
        Self { routers, es, reconcile_queue }
    }

    /// `spotfi/router/R/status` payload is just `"ONLINE"` or `"OFFLINE"`.
    pub async fn handle_status(&self, router_id: &str, payload: &str) {
        match payload.trim() {
            "ONLINE" => self.handle_online(router_id).await,
            "OFFLINE" => self.handle_offline(router_id).await,
            other => warn!(router_id, payload = other, "unrecognized status payload, ignoring"),
        }
    }

    async fn handle_online(&self, router_id: &str) {
        let key = EphemeralStore::router_liveness_key(router_id);
        if let Err(e) = self.es.set_with_ttl(&key, "ONLINE", LIVENESS_TTL_SECS).await {
            warn!(router_id, error = %e, "failed to set liveness key");
        }

        if let Err(e) = self
            .routers
            .set_status_with_last_seen(router_id, RouterStatus::Online, chrono::Utc::now())
            .await
        {
            warn!(router_id, error = %e, "failed to mark router online in RS");
            return;
        }

        match self.routers.find_by_id(router_id).await {
            Ok(Some(router)) => {
                if let Some(nas_ip) = router.nas_ip_address.clone() {
                    if let Err(e) = self
                        .routers
                        .upsert_radius_client(&router.id, &nas_ip, &router.radius_secret, &router.name)
                        .await
                    {
                        warn!(router_id, error = %e, "failed to upsert radius nas client");
                    }
                }
            }
            Ok(None) => warn!(router_id, "router went online but has no RS row"),
            Err(e) => warn!(router_id, error = %e, "failed to load router after ONLINE"),
        }

        info!(router_id, "router online");
    }

    async fn handle_offline(&self, router_id: &str) {
        let key = EphemeralStore::router_liveness_key(router_id);
        if let Err(e) = self.es.del(&key).await {
            warn!(router_id, error = %e, "failed to clear liveness key");
        }
        self.reconcile_queue.enqueue(router_id.to_string()).await;
        info!(router_id, "router offline, reconciliation enqueued");
    }

    /// Heartbeats refresh the liveness TTL without touching RS (spec.md
    /// §5 "Shared-resource policy": `lastSeen`/`status` are merged writes,
    /// never on every heartbeat).
    pub async fn handle_heartbeat(&self, router_id: &str) {
        let key = EphemeralStore::router_liveness_key(router_id);
        if let Err(e) = self.es.set_with_ttl(&key, "ONLINE", LIVENESS_TTL_SECS).await {
            warn!(router_id, error = %e, "failed to refresh liveness key on heartbeat");
        }
    }

    /// Periodic sweeper (spec.md §4.1 "Presence"): if a router's liveness
    /// TTL expired without a refresh — e.g. an ungraceful network split
    /// the broker itself never noticed — promote it to OFFLINE in RS.
    pub async fn sweep_expired_liveness(&self) {
        let stale = match self
            .routers
            .list_stale_online(chrono::Duration::seconds(LIVENESS_TTL_SECS as i64))
            .await
        {
            Ok(routers) => routers,
            Err(e) => {
                warn!(error = %e, "liveness sweep: failed to list stale routers");
                return;
            }
        };

        for router in stale {
            let key = EphemeralStore::router_liveness_key(&router.id);
            match self.es.exists(&key).await {
                Ok(true) => continue, // still alive, RS just hasn't been bulk-updated yet
                Ok(false) => {}
                Err(e) => {
                    warn!(router_id = %router.id, error = %e, "liveness sweep: ES check failed");
                    continue;
                }
            }

            if let Err(e) = self.routers.set_status(&router.id, RouterStatus::Offline).await {
                warn!(router_id = %router.id, error = %e, "liveness sweep: failed to mark offline");
            } else {
                info!(router_id = %router.id, "liveness sweep: promoted to OFFLINE");
                self.reconcile_queue.enqueue(router.id).await;
            }
        }
    }
}
