//! Public call surface for edge RPCs (spec.md §4.1, §5 "Cancellation and
//! timeouts"): publish the envelope, await the correlated response with a
//! 15s timeout, and map broker-level failures to the taxonomy in §7.

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, QoS};
use tracing::warn;

use spotfi_shared::rpc::{RpcRequest, RpcResponse};
use spotfi_shared::topics;

use super::correlation::{CorrelationMap, RpcError};

const RPC_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct EdgeRpcClient {
    client: AsyncClient,
    correlation: Arc<CorrelationMap>,
}

impl EdgeRpcClient {
    pub fn new(client: AsyncClient, correlation: Arc<CorrelationMap>) -> Self {
        Self { client, correlation }
    }

    pub fn instance_id(&self) -> &str {
        self.correlation.instance_id()
    }

    /// Sends one RPC to `router_id` and awaits its response. Resource-busy
    /// (spec.md §7) is surfaced immediately, before ever touching the
    /// broker, once 64 requests are outstanding for that router.
    pub async fn call(&self, router_id: &str, request: RpcRequest) -> Result<RpcResponse, RpcError> {
        let receiver = self.correlation.register(request.id.clone(), router_id)?;

        let payload = serde_json::to_vec(&request)
            .expect("RpcRequest always serializes");
        let topic = topics::rpc_request(router_id);

        if let Err(e) = self
            .client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .await
        {
            self.correlation.evict(&request.id);
            warn!(router_id, error = %e, "broker publish failed");
            return Err(RpcError::BrokerUnavailable);
        }

        match tokio::time::timeout(RPC_TIMEOUT, receiver).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => {
                // Sender dropped without a send — treat as a broker-side
                // disconnect, not a timeout.
                self.correlation.evict(&request.id);
                Err(RpcError::BrokerUnavailable)
            }
            Err(_) => {
                self.correlation.evict(&request.id);
                Err(RpcError::Timeout)
            }
        }
    }
}
