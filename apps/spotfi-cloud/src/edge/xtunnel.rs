//! Interactive-shell tunnel multiplexed on the broker (spec.md §4.1
//! "X-Tunnel"). One `TunnelSession` per WebSocket, forwarding frames
//! between the browser and `spotfi/router/R/x/{in,out}`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use rumqttc::{AsyncClient, QoS};
use tokio::sync::mpsc;
use tracing::{info, warn};

use spotfi_shared::topics;
use spotfi_shared::xtunnel::XFrame;

/// Terminal bytes are reaped on the edge after 2 minutes idle (spec.md
/// §4.1); the cloud applies its own WebSocket inactivity threshold here.
pub const WS_IDLE_TIMEOUT_SECS: u64 = 180;

struct TunnelSession {
    router_id: String,
    to_websocket: mpsc::Sender<XFrame>,
    last_activity: Instant,
}

/// Registry of live tunnel sessions for this cloud instance (spec.md §9
/// "Global state": per-instance, not shared across the fleet).
pub struct XTunnelRegistry {
    client: AsyncClient,
    sessions: Mutex<HashMap<String, TunnelSession>>,
    /// Sessions keyed by a caller-supplied, WebSocket-reconnect-stable
    /// terminal id, so a reconnecting frontend client replaces its own
    /// prior session instead of accumulating ghosts (spec.md §4.1
    /// "On reconnect, the cloud MUST first close all prior active
    /// sessions for that device before starting a new one").
    terminals: Mutex<HashMap<String, String>>, // terminal_id -> session_id
}

impl XTunnelRegistry {
    pub fn new(client: AsyncClient) -> Self {
        Self {
            client,
            sessions: Mutex::new(HashMap::new()),
            terminals: Mutex::new(HashMap::new()),
        }
    }

    /// Starts a new tunnel session to `router_id`. If `terminal_id` names
    /// an already-tracked session, that session is closed first.
    pub async fn start_session(
        &self,
        router_id: &str,
        terminal_id: Option<&str>,
        to_websocket: mpsc::Sender<XFrame>,
    ) -> String {
        if let Some(terminal_id) = terminal_id {
            self.close_terminal(terminal_id).await;
        }

        let session_id = uuid::Uuid::new_v4().to_string();
        self.sessions.lock().unwrap().insert(
            session_id.clone(),
            TunnelSession {
                router_id: router_id.to_string(),
                to_websocket,
                last_activity: Instant::now(),
            },
        );
        if let Some(terminal_id) = terminal_id {
            self.terminals
                .lock()
                .unwrap()
                .insert(terminal_id.to_string(), session_id.clone());
        }

        let frame = XFrame::XStart {
            session_id: session_id.clone(),
            response_topic: topics::x_out(router_id),
        };
        self.publish_to_edge(router_id, &frame).await;

        info!(router_id, session_id, "x-tunnel session started");
        session_id
    }

    async fn close_terminal(&self, terminal_id: &str) {
        let prior_session_id = self.terminals.lock().unwrap().remove(terminal_id);
        if let Some(session_id) = prior_session_id {
            self.stop_session(&session_id).await;
        }
    }

    pub async fn stop_session(&self, session_id: &str) {
        let removed = self.sessions.lock().unwrap().remove(session_id);
        if let Some(session) = removed {
            let frame = XFrame::XStop { session_id: session_id.to_string() };
            self.publish_to_edge(&session.router_id, &frame).await;
            info!(session_id, router_id = session.router_id, "x-tunnel session stopped");
        }
    }

    /// Inbound WebSocket text (terminal keystrokes) forwarded to the
    /// router as an `x-data` frame.
    pub async fn send_input(&self, session_id: &str, bytes: &[u8]) {
        let router_id = {
            let mut sessions = self.sessions.lock().unwrap();
            match sessions.get_mut(session_id) {
                Some(session) => {
                    session.last_activity = Instant::now();
                    session.router_id.clone()
                }
                None => return,
            }
        };
        let frame = XFrame::data(session_id.to_string(), bytes);
        self.publish_to_edge(&router_id, &frame).await;
    }

    /// Called when a frame arrives on `spotfi/router/R/x/out`: forwards
    /// `x-data`/`x-started` payloads to the owning WebSocket, if this
    /// instance owns that session.
    pub fn deliver_from_edge(&self, frame: XFrame) {
        let sender = {
            let mut sessions = self.sessions.lock().unwrap();
            match sessions.get_mut(frame.session_id()) {
                Some(session) => {
                    session.last_activity = Instant::now();
                    Some(session.to_websocket.clone())
                }
                None => None,
            }
        };
        if let Some(sender) = sender {
            let _ = sender.try_send(frame);
        }
    }

    async fn publish_to_edge(&self, router_id: &str, frame: &XFrame) {
        let payload = serde_json::to_vec(frame).expect("XFrame always serializes");
        if let Err(e) = self
            .client
            .publish(topics::x_in(router_id), QoS::AtMostOnce, false, payload)
            .await
        {
            warn!(router_id, error = %e, "failed to publish x-tunnel frame");
        }
    }

    /// Reaps sessions idle past the cloud-side WebSocket inactivity
    /// threshold (spec.md §4.1 — the edge reaps its own side after 2m).
    pub async fn reap_idle(&self) {
        let idle: Vec<String> = {
            let sessions = self.sessions.lock().unwrap();
            sessions
                .iter()
                .filter(|(_, s)| s.last_activity.elapsed().as_secs() > WS_IDLE_TIMEOUT_SECS)
                .map(|(id, _)| id.clone())
                .collect()
        };
        for session_id in idle {
            self.stop_session(&session_id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::MqttOptions;

    fn test_client() -> AsyncClient {
        let options = MqttOptions::new("test", "127.0.0.1", 1883);
        let (client, _eventloop) = AsyncClient::new(options, 16);
        client
    }

    #[tokio::test]
    async fn reconnect_closes_prior_session_for_the_same_terminal() {
        let registry = XTunnelRegistry::new(test_client());
        let (tx1, _rx1) = mpsc::channel(8);
        let (tx2, _rx2) = mpsc::channel(8);

        let first = registry.start_session("R1", Some("term-a"), tx1).await;
        assert!(registry.sessions.lock().unwrap().contains_key(&first));

        let second = registry.start_session("R1", Some("term-a"), tx2).await;
        assert!(!registry.sessions.lock().unwrap().contains_key(&first));
        assert!(registry.sessions.lock().unwrap().contains_key(&second));
    }
}
