//! Request/response correlation across a horizontally scaled cloud
//! (spec.md §4.1 "Correlation (the hard part)"). One map per cloud
//! instance; other instances' responses are dropped by topic-prefix
//! filtering before they would ever reach here (see `rpc.rs`).
//!
//! Shaped directly after `pubsub_service.rs`'s `waiters` map: a
//! `Mutex<HashMap<String, oneshot::Sender<_>>>` is plenty at the core's
//! modest object counts (spec.md §9 "Arena/index alternative").

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::oneshot;

use spotfi_shared::rpc::RpcResponse;

const MAX_OUTSTANDING_PER_ROUTER: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("timed out waiting for rpc response")]
    Timeout,
    #[error("router has too many outstanding rpcs")]
    RouterBusy,
    #[error("broker unavailable")]
    BrokerUnavailable,
    #[error("router not connected")]
    RouterNotConnected,
}

struct Outstanding {
    router_id: String,
    sender: oneshot::Sender<RpcResponse>,
}

pub struct CorrelationMap {
    instance_id: String,
    entries: Mutex<HashMap<String, Outstanding>>,
    per_router_counts: Mutex<HashMap<String, usize>>,
}

impl CorrelationMap {
    pub fn new(instance_id: String) -> Self {
        Self {
            instance_id,
            entries: Mutex::new(HashMap::new()),
            per_router_counts: Mutex::new(HashMap::new()),
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Registers a new outstanding request, failing fast with
    /// `RouterBusy` past the 64-outstanding-per-router cap.
    pub fn register(
        &self,
        request_id: String,
        router_id: &str,
    ) -> Result<oneshot::Receiver<RpcResponse>, RpcError> {
        let mut counts = self.per_router_counts.lock().unwrap();
        let count = counts.entry(router_id.to_string()).or_insert(0);
        if *count >= MAX_OUTSTANDING_PER_ROUTER {
            return Err(RpcError::RouterBusy);
        }
        *count += 1;
        drop(counts);

        let (tx, rx) = oneshot::channel();
        self.entries.lock().unwrap().insert(
            request_id,
            Outstanding {
                router_id: router_id.to_string(),
                sender: tx,
            },
        );
        Ok(rx)
    }

    /// Called on message receipt for `spotfi/router/+/rpc/response`. If
    /// the id belongs to this instance and is still outstanding, fulfils
    /// it; otherwise this is a no-op (either a late/timed-out reply or a
    /// response meant for a different instance — both are silently
    /// dropped per spec.md §4.1).
    pub fn resolve(&self, response: RpcResponse) {
        let removed = self.entries.lock().unwrap().remove(&response.id);
        if let Some(outstanding) = removed {
            self.decrement(&outstanding.router_id);
            let _ = outstanding.sender.send(response);
        }
    }

    /// Called when a request's 15s timeout elapses. Evicts the entry
    /// regardless of whether a late response later arrives for it.
    pub fn evict(&self, request_id: &str) {
        let removed = self.entries.lock().unwrap().remove(request_id);
        if let Some(outstanding) = removed {
            self.decrement(&outstanding.router_id);
        }
    }

    pub fn outstanding_count(&self, router_id: &str) -> usize {
        *self.per_router_counts.lock().unwrap().get(router_id).unwrap_or(&0)
    }

    fn decrement(&self, router_id: &str) {
        let mut counts = self.per_router_counts.lock().unwrap();
        if let Some(c) = counts.get_mut(router_id) {
            *c = c.saturating_sub(1);
        }
    }

    /// Belongs-to-us check applied before even attempting to resolve —
    /// response ids not prefixed with our instance id are another
    /// instance's concern and are dropped without touching the map.
    pub fn owns(&self, request_id: &str) -> bool {
        spotfi_shared::rpc::RpcRequest::instance_id_of(request_id) == Some(self.instance_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spotfi_shared::rpc::RpcStatus;

    fn ok_response(id: &str) -> RpcResponse {
        RpcResponse {
            id: id.to_string(),
            status: RpcStatus::Success,
            result: None,
            error: None,
            stderr: None,
        }
    }

    #[tokio::test]
    async fn resolves_exactly_once() {
        let map = CorrelationMap::new("inst1".to_string());
        let id = spotfi_shared::rpc::RpcRequest::new_id("inst1");
        let rx = map.register(id.clone(), "R1").unwrap();

        map.resolve(ok_response(&id));
        let resp = rx.await.unwrap();
        assert_eq!(resp.id, id);

        // A second arrival with the same id is a no-op: the entry is
        // already gone, so resolve() just drops it.
        map.resolve(ok_response(&id));
        assert_eq!(map.outstanding_count("R1"), 0);
    }

    #[test]
    fn drops_responses_belonging_to_other_instances() {
        let map = CorrelationMap::new("inst1".to_string());
        let foreign_id = spotfi_shared::rpc::RpcRequest::new_id("inst2");
        assert!(!map.owns(&foreign_id));
    }

    #[test]
    fn router_busy_past_cap() {
        let map = CorrelationMap::new("inst1".to_string());
        for i in 0..MAX_OUTSTANDING_PER_ROUTER {
            let id = format!("inst1-{i}");
            map.register(id, "R1").unwrap();
        }
        let overflow = map.register("inst1-overflow".to_string(), "R1");
        assert!(matches!(overflow, Err(RpcError::RouterBusy)));
    }

    #[test]
    fn eviction_releases_the_router_slot() {
        let map = CorrelationMap::new("inst1".to_string());
        let id = "inst1-1".to_string();
        let _rx = map.register(id.clone(), "R1").unwrap();
        assert_eq!(map.outstanding_count("R1"), 1);
        map.evict(&id);
        assert_eq!(map.outstanding_count("R1"), 0);
    }

    #[test]
    fn late_response_after_eviction_is_dropped() {
        let map = CorrelationMap::new("inst1".to_string());
        let id = "inst1-1".to_string();
        let _rx = map.register(id.clone(), "R1").unwrap();
        map.evict(&id);
        // Arrival after eviction: resolve() finds nothing to fulfil.
        map.resolve(ok_response(&id));
        assert_eq!(map.outstanding_count("R1"), 0);
    }
}
