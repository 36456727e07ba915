//! Builders and parsers for the `spotfi/router/<id>/...` topic schema
//! (see spec.md §4.1). Kept free of any broker-client types so both the
//! cloud binary and tests can depend on it without pulling in `rumqttc`.

pub const WILDCARD_RESPONSE: &str = "spotfi/router/+/rpc/response";
pub const WILDCARD_STATUS: &str = "spotfi/router/+/status";
pub const WILDCARD_METRICS: &str = "spotfi/router/+/metrics";
pub const WILDCARD_X_OUT: &str = "spotfi/router/+/x/out";

pub fn status(router_id: &str) -> String {
    format!("spotfi/router/{router_id}/status")
}

pub fn metrics(router_id: &str) -> String {
    format!("spotfi/router/{router_id}/metrics")
}

pub fn rpc_request(router_id: &str) -> String {
    format!("spotfi/router/{router_id}/rpc/request")
}

pub fn rpc_response(router_id: &str) -> String {
    format!("spotfi/router/{router_id}/rpc/response")
}

pub fn x_in(router_id: &str) -> String {
    format!("spotfi/router/{router_id}/x/in")
}

pub fn x_out(router_id: &str) -> String {
    format!("spotfi/router/{router_id}/x/out")
}

/// Own-namespace ACL pattern a router is restricted to on the broker.
pub fn router_namespace(router_id: &str) -> String {
    format!("spotfi/router/{router_id}/#")
}

/// Extracts the router id from any `spotfi/router/<id>/...` topic.
/// Returns `None` for anything that doesn't match the schema.
pub fn router_id_from_topic(topic: &str) -> Option<&str> {
    let rest = topic.strip_prefix("spotfi/router/")?;
    rest.split('/').next().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_and_parses_roundtrip() {
        let id = "R2";
        assert_eq!(router_id_from_topic(&status(id)), Some(id));
        assert_eq!(router_id_from_topic(&rpc_request(id)), Some(id));
        assert_eq!(router_id_from_topic(&rpc_response(id)), Some(id));
        assert_eq!(router_id_from_topic(&x_in(id)), Some(id));
        assert_eq!(router_id_from_topic(&x_out(id)), Some(id));
    }

    #[test]
    fn rejects_unrelated_topics() {
        assert_eq!(router_id_from_topic("spotfi/other/R2/status"), None);
        assert_eq!(router_id_from_topic("unrelated"), None);
    }
}
