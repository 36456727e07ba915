//! Broker connection plumbing (spec.md §4.1 "Authentication at the
//! broker", §4.1 "Failure semantics"). The cloud authenticates as a
//! privileged service account and subscribes with wildcards; routers
//! authenticate as `(username=routerId, password=token)` and are
//! confined to their own namespace by broker ACLs (enforced broker-side,
//! outside this crate's scope).

use std::time::Duration;

use rumqttc::{AsyncClient, MqttOptions, QoS};
use tracing::{info, warn};

use spotfi_shared::topics;

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    pub instance_id: String,
}

/// Parses a `mqtt://host:port` URL into rumqttc's `(host, port)` pair.
/// Falls back to the standard 1883 port when unspecified.
fn parse_host_port(url: &str) -> (String, u16) {
    let without_scheme = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("mqtts://"))
        .unwrap_or(url);
    match without_scheme.split_once(':') {
        Some((host, port)) => (host.to_string(), port.parse().unwrap_or(1883)),
        None => (without_scheme.to_string(), 1883),
    }
}

pub fn new_client(config: &BrokerConfig) -> (AsyncClient, rumqttc::EventLoop) {
    let (host, port) = parse_host_port(&config.url);
    let client_id = format!("spotfi-cloud-{}", config.instance_id);

    let mut options = MqttOptions::new(client_id, host, port);
    options.set_credentials(config.username.clone(), config.password.clone());
    options.set_keep_alive(Duration::from_secs(30));

    AsyncClient::new(options, 256)
}

/// Subscribes this instance to every wildcard topic it needs to observe
/// (spec.md §4.1 table): router status (presence), RPC responses, and
/// x-tunnel frames coming back from the edge. Metrics/heartbeat
/// subscription is included so the presence sweeper can refresh liveness
/// TTLs on every heartbeat, not just on ONLINE.
pub async fn subscribe_wildcards(client: &AsyncClient) -> Result<(), rumqttc::ClientError> {
    client.subscribe(topics::WILDCARD_STATUS, QoS::AtLeastOnce).await?;
    client.subscribe(topics::WILDCARD_METRICS, QoS::AtMostOnce).await?;
    client.subscribe(topics::WILDCARD_RESPONSE, QoS::AtMostOnce).await?;
    client.subscribe(topics::WILDCARD_X_OUT, QoS::AtMostOnce).await?;
    Ok(())
}

/// Exponential backoff with a 1s floor and 30s cap (spec.md §4.1).
pub struct Backoff {
    current: Duration,
}

impl Backoff {
    pub fn new() -> Self {
        Self { current: Duration::from_secs(1) }
    }

    pub async fn wait(&mut self) {
        warn!("broker connection lost, retrying in {:?}", self.current);
        tokio::time::sleep(self.current).await;
        self.current = (self.current * 2).min(Duration::from_secs(30));
    }

    pub fn reset(&mut self) {
        if self.current != Duration::from_secs(1) {
            info!("broker connection restored");
        }
        self.current = Duration::from_secs(1);
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_and_port() {
        assert_eq!(parse_host_port("mqtt://broker.local:1883"), ("broker.local".to_string(), 1883));
        assert_eq!(parse_host_port("broker.local"), ("broker.local".to_string(), 1883));
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_caps_at_30s_and_resets() {
        let mut backoff = Backoff::new();
        assert_eq!(backoff.current, Duration::from_secs(1));
        backoff.current = Duration::from_secs(20);
        backoff.wait().await;
        assert_eq!(backoff.current, Duration::from_secs(30));
        backoff.wait().await;
        assert_eq!(backoff.current, Duration::from_secs(30));
        backoff.reset();
        assert_eq!(backoff.current, Duration::from_secs(1));
    }
}
