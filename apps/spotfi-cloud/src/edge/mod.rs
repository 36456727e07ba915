pub mod broker;
pub mod correlation;
pub mod presence;
pub mod rpc;
pub mod ws;
pub mod xtunnel;

use std::sync::Arc;

use rumqttc::{AsyncClient, Event, Packet};
use tracing::{debug, error, warn};

use spotfi_shared::rpc::RpcResponse;
use spotfi_shared::topics;
use spotfi_shared::xtunnel::XFrame;

use broker::{Backoff, BrokerConfig};
use correlation::CorrelationMap;
use presence::PresenceHandler;
use rpc::EdgeRpcClient;
use xtunnel::XTunnelRegistry;

/// Everything the rest of the binary needs to reach the fleet: the RPC
/// call surface, the x-tunnel registry, and (indirectly, via the
/// dispatch loop) presence updates. One instance per cloud process
/// (spec.md §9 "Global state").
///
/// Construction is two-phase: `connect` brings up the broker client and
/// the RPC/x-tunnel surface without yet consuming events, because the
/// presence handler the dispatch loop feeds needs an `EdgeRpcClient` of
/// its own (for router reconciliation) before it can exist. Callers
/// build their presence handler from the returned fabric, then call
/// `spawn_dispatch_loop`.
pub struct EdgeFabric {
    pub rpc: EdgeRpcClient,
    pub xtunnel: Arc<XTunnelRegistry>,
    client: AsyncClient,
    correlation: Arc<CorrelationMap>,
}

impl EdgeFabric {
    pub fn connect(config: BrokerConfig) -> (Self, rumqttc::EventLoop) {
        let (client, eventloop) = broker::new_client(&config);
        let correlation = Arc::new(CorrelationMap::new(config.instance_id.clone()));
        let xtunnel = Arc::new(XTunnelRegistry::new(client.clone()));

        let fabric = Self {
            rpc: EdgeRpcClient::new(client.clone(), correlation.clone()),
            xtunnel,
            client,
            correlation,
        };
        (fabric, eventloop)
    }

    /// Starts consuming broker events. Must be called exactly once, after
    /// the presence handler (and anything it depends on) is ready.
    pub fn spawn_dispatch_loop(&self, eventloop: rumqttc::EventLoop, presence: Arc<PresenceHandler>) {
        tokio::spawn(dispatch_loop(eventloop, self.client.clone(), self.correlation.clone(), self.xtunnel.clone(), Some(presence)));
    }

    /// Starts consuming broker events without a presence handler: RPC
    /// responses are still correlated, but status/metrics publishes are
    /// dropped. Used by one-shot CLI commands that only need `rpc.call`.
    pub fn spawn_rpc_only_loop(&self, eventloop: rumqttc::EventLoop) {
        tokio::spawn(dispatch_loop(eventloop, self.client.clone(), self.correlation.clone(), self.xtunnel.clone(), None));
    }

    pub fn instance_id(&self) -> &str {
        self.correlation.instance_id()
    }
}

async fn dispatch_loop(
    mut eventloop: rumqttc::EventLoop,
    client: AsyncClient,
    correlation: Arc<CorrelationMap>,
    xtunnel: Arc<XTunnelRegistry>,
    presence: Option<Arc<PresenceHandler>>,
) {
    let mut backoff = Backoff::new();
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                backoff.reset();
                if let Err(e) = broker::subscribe_wildcards(&client).await {
                    error!(error = %e, "failed to subscribe to wildcard topics after connect");
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                handle_publish(&publish.topic, &publish.payload, &correlation, &xtunnel, presence.as_ref()).await;
            }
            Ok(_other) => {}
            Err(e) => {
                warn!(error = %e, "broker event loop error");
                backoff.wait().await;
            }
        }
    }
}

async fn handle_publish(
    topic: &str,
    payload: &[u8],
    correlation: &Arc<CorrelationMap>,
    xtunnel: &Arc<XTunnelRegistry>,
    presence: Option<&Arc<PresenceHandler>>,
) {
    let Some(router_id) = topics::router_id_from_topic(topic) else {
        debug!(topic, "publish on unrecognized topic, ignoring");
        return;
    };

    if topic.ends_with("/rpc/response") {
        match serde_json::from_slice::<RpcResponse>(payload) {
            Ok(response) => {
                // Drop responses belonging to a different cloud instance
                // before even touching the map (spec.md §4.1).
                if correlation.owns(&response.id) {
                    correlation.resolve(response);
                }
            }
            Err(e) => warn!(topic, error = %e, "malformed rpc response, dropping"),
        }
    } else if topic.ends_with("/status") {
        if let Some(presence) = presence {
            let status = String::from_utf8_lossy(payload).to_string();
            presence.handle_status(router_id, &status).await;
        }
    } else if topic.ends_with("/metrics") {
        if let Some(presence) = presence {
            presence.handle_heartbeat(router_id).await;
        }
    } else if topic.ends_with("/x/out") {
        match serde_json::from_slice::<XFrame>(payload) {
            Ok(frame) => xtunnel.deliver_from_edge(frame),
            Err(e) => warn!(topic, error = %e, "malformed x-tunnel frame, dropping"),
        }
    } else {
        debug!(topic, "publish on unhandled but recognized router topic");
    }
}
