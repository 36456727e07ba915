use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum RouterStatus {
    Online,
    Offline,
    Error,
}

/// spec.md §3 "Router". `token` authenticates the device on the broker;
/// `mac_address` and `name` are stored pre-normalized (uppercase/no
/// separators, lowercase alphanumeric-only respectively) so router
/// identity resolution (spec.md §4.3) never re-normalizes at query time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Router {
    pub id: String,
    pub token: String,
    pub radius_secret: String,
    pub uam_secret: String,
    pub mac_address: Option<String>,
    pub nas_ip_address: Option<String>,
    pub name: String,
    pub host_id: String,
    pub status: RouterStatus,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct RouterDailyUsage {
    pub router_id: String,
    pub usage_date: chrono::NaiveDate,
    pub bytes_total: i64,
}
