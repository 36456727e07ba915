use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// spec.md §3 "UsageCounter". `period_key` encodes the plan's quota
/// period (e.g. `2026-07` for MONTHLY, `2026-07-26` for DAILY), so a user
/// with several plan types in flight gets one row per period kind.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UsageCounter {
    pub username: String,
    pub period_key: String,
    pub bytes_total: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum DisconnectReason {
    QuotaExceeded,
    PlanExpired,
}

/// spec.md §3 "DisconnectJob". Durable row in the work queue table;
/// `processed=false` rows are unique per username (partial index) so the
/// exhaustion trigger never double-enqueues.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DisconnectJob {
    pub id: i64,
    pub username: String,
    pub reason: DisconnectReason,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub processed: bool,
    pub processed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub attempts: i32,
}
