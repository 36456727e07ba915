use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum QuotaType {
    Monthly,
    Daily,
    Weekly,
    OneTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Plan {
    pub id: i64,
    pub name: String,
    pub data_quota_bytes: Option<i64>,
    pub quota_type: QuotaType,
    pub upload_bps: Option<i64>,
    pub download_bps: Option<i64>,
    pub session_timeout_secs: Option<i32>,
    pub idle_timeout_secs: Option<i32>,
    pub max_concurrent_sessions: i32,
    pub validity_days: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum AssignmentStatus {
    Pending,
    Active,
    Expired,
    Cancelled,
}

/// spec.md §3 "PlanAssignment (UserPlan)". `data_quota_bytes` snapshots
/// the plan's quota at assignment time so a later change to the plan
/// catalogue entry never retroactively changes an in-flight assignment.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlanAssignment {
    pub id: i64,
    pub username: String,
    pub plan_id: i64,
    pub assigned_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub data_used_bytes: i64,
    pub data_quota_bytes: Option<i64>,
    pub status: AssignmentStatus,
}
