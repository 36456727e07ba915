use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::{AssignmentStatus, Plan, PlanAssignment};

#[derive(Debug, Clone)]
pub struct PlanRepository {
    pool: PgPool,
}

impl PlanRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_plan(&self, plan_id: i64) -> Result<Option<Plan>> {
        sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = $1")
            .bind(plan_id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch plan")
    }

    /// All assignments that currently grant service: `status=ACTIVE AND
    /// expiresAt > now` (spec.md §3 invariant). A user may hold more than
    /// one; the quota engine aggregates across them.
    pub async fn active_assignments_for_user(&self, username: &str) -> Result<Vec<PlanAssignment>> {
        sqlx::query_as::<_, PlanAssignment>(
            "SELECT * FROM plan_assignments
             WHERE username = $1 AND status = 'ACTIVE' AND (expires_at IS NULL OR expires_at > now())",
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch active plan assignments")
    }

    pub async fn expired_active_assignments(&self) -> Result<Vec<PlanAssignment>> {
        sqlx::query_as::<_, PlanAssignment>(
            "SELECT * FROM plan_assignments WHERE status = 'ACTIVE' AND expires_at <= now()",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch expired active plan assignments")
    }

    pub async fn set_status(&self, id: i64, status: AssignmentStatus) -> Result<()> {
        sqlx::query("UPDATE plan_assignments SET status = $1 WHERE id = $2")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to set plan assignment status")?;
        Ok(())
    }

    pub async fn add_data_used(&self, username: &str, delta_bytes: i64) -> Result<()> {
        sqlx::query(
            "UPDATE plan_assignments SET data_used_bytes = data_used_bytes + $1
             WHERE username = $2 AND status = 'ACTIVE'",
        )
        .bind(delta_bytes)
        .bind(username)
        .execute(&self.pool)
        .await
        .context("failed to add data used")?;
        Ok(())
    }
}
