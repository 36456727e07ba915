use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// spec.md §3 "Session (accounting record)". Immutable except for the
/// byte counters (monotonic while open) and the terminal fields set
/// exactly once at close.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub acct_unique_id: String,
    pub session_id: String,
    pub username: String,
    pub router_id: Option<String>,
    pub nas_ip_address: Option<String>,
    pub calling_station_id: Option<String>,
    pub framed_ip_address: Option<String>,
    pub acct_start_time: DateTime<Utc>,
    pub acct_update_time: DateTime<Utc>,
    pub acct_stop_time: Option<DateTime<Utc>>,
    pub acct_input_octets: i64,
    pub acct_output_octets: i64,
    pub acct_terminate_cause: Option<String>,
}

impl Session {
    pub fn is_open(&self) -> bool {
        self.acct_stop_time.is_none()
    }

    pub fn total_bytes(&self) -> i64 {
        self.acct_input_octets + self.acct_output_octets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(stop: Option<DateTime<Utc>>, input: i64, output: i64) -> Session {
        let now = Utc::now();
        Session {
            acct_unique_id: "u1".to_string(),
            session_id: "s1".to_string(),
            username: "alice".to_string(),
            router_id: None,
            nas_ip_address: None,
            calling_station_id: None,
            framed_ip_address: None,
            acct_start_time: now,
            acct_update_time: now,
            acct_stop_time: stop,
            acct_input_octets: input,
            acct_output_octets: output,
            acct_terminate_cause: None,
        }
    }

    #[test]
    fn open_session_has_no_stop_time() {
        assert!(session(None, 0, 0).is_open());
        assert!(!session(Some(Utc::now()), 0, 0).is_open());
    }

    #[test]
    fn empty_accounting_row_yields_zero_total() {
        // spec.md §8 boundary: empty accounting row yields counter delta 0.
        assert_eq!(session(None, 0, 0).total_bytes(), 0);
    }

    #[test]
    fn total_bytes_sums_both_directions() {
        assert_eq!(session(None, 600_000_000, 500_000_000).total_bytes(), 1_100_000_000);
    }
}
