//! X-Tunnel frame schema (spec.md §4.1 "X-Tunnel (interactive shell)").
//! Frames travel both over the broker (cloud↔edge) and, reshaped as
//! WebSocket text, between the cloud and the frontend.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum XFrame {
    XStart {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "responseTopic")]
        response_topic: String,
    },
    XStarted {
        #[serde(rename = "sessionId")]
        session_id: String,
        status: String,
    },
    XData {
        #[serde(rename = "sessionId")]
        session_id: String,
        /// Base64-encoded terminal bytes (spec.md §8 round-trip law).
        data: String,
    },
    XStop {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
}

impl XFrame {
    pub fn session_id(&self) -> &str {
        match self {
            XFrame::XStart { session_id, .. }
            | XFrame::XStarted { session_id, .. }
            | XFrame::XData { session_id, .. }
            | XFrame::XStop { session_id, .. } => session_id,
        }
    }

    pub fn data(session_id: impl Into<String>, raw_bytes: &[u8]) -> Self {
        use base64::Engine;
        XFrame::XData {
            session_id: session_id.into(),
            data: base64::engine::general_purpose::STANDARD.encode(raw_bytes),
        }
    }

    pub fn decode_data(&self) -> Option<Vec<u8>> {
        use base64::Engine;
        match self {
            XFrame::XData { data, .. } => base64::engine::general_purpose::STANDARD.decode(data).ok(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_roundtrip_recovers_original_bytes() {
        let original = b"\x00\x01\x1b[31mhello\xff";
        let frame = XFrame::data("s1", original);
        assert_eq!(frame.decode_data().unwrap(), original.to_vec());
    }

    #[test]
    fn wire_format_uses_camel_case_keys() {
        let frame = XFrame::XStart {
            session_id: "s1".to_string(),
            response_topic: "spotfi/router/R/x/out".to_string(),
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"sessionId\":\"s1\""));
        assert!(json.contains("\"type\":\"x-start\""));
    }
}
