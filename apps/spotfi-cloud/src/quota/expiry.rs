//! Hourly plan-expiry job (spec.md §4.2 "Plan expiry"): marks assignments
//! past `expires_at` as EXPIRED. If the user has no other active
//! assignment, enqueues a PLAN_EXPIRED disconnect; otherwise re-syncs
//! their RADIUS reply attributes to the aggregated remaining limits
//! across whatever plans are still active.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use spotfi_db::models::{AssignmentStatus, DisconnectReason};
use spotfi_db::repositories::{DisconnectRepository, PlanRepository, RadiusRepository};

use crate::quota::worker::DisconnectWorkerPool;

const RUN_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub struct PlanExpiryJob {
    plans: PlanRepository,
    disconnects: DisconnectRepository,
    radius: RadiusRepository,
    worker_pool: Arc<DisconnectWorkerPool>,
}

impl PlanExpiryJob {
    pub fn new(
        plans: PlanRepository,
        disconnects: DisconnectRepository,
        radius: RadiusRepository,
        worker_pool: Arc<DisconnectWorkerPool>,
    ) -> Self {
        Self { plans, disconnects, radius, worker_pool }
    }

    pub async fn run(self) {
        let mut ticker = tokio::time::interval(RUN_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_once().await {
                warn!(error = %e, "plan expiry job failed");
            }
        }
    }

    pub async fn run_once(&self) -> anyhow::Result<()> {
        let expired = self.plans.expired_active_assignments().await?;
        if expired.is_empty() {
            return Ok(());
        }
        info!(count = expired.len(), "plan expiry job processing expired assignments");

        for assignment in expired {
            self.plans.set_status(assignment.id, AssignmentStatus::Expired).await?;

            let remaining = self.plans.active_assignments_for_user(&assignment.username).await?;
            if remaining.is_empty() {
                self.radius.upsert_reject(&assignment.username).await?;
                let job_id = self.disconnects.enqueue(&assignment.username, DisconnectReason::PlanExpired).await?;
                self.worker_pool.submit(job_id).await;
            } else {
                self.resync_reply_attributes(&assignment.username, &remaining).await?;
            }
        }
        Ok(())
    }

    async fn resync_reply_attributes(
        &self,
        username: &str,
        remaining: &[spotfi_db::models::PlanAssignment],
    ) -> anyhow::Result<()> {
        let has_unlimited = remaining.iter().any(|a| a.data_quota_bytes.is_none());
        let value = if has_unlimited {
            "unlimited".to_string()
        } else {
            let total_remaining: i64 = remaining
                .iter()
                .map(|a| (a.data_quota_bytes.unwrap_or(0) - a.data_used_bytes).max(0))
                .sum();
            total_remaining.to_string()
        };
        self.radius.upsert_reply(username, "SpotFi-Quota-Remaining-Bytes", &value).await?;
        Ok(())
    }
}
