use std::sync::Arc;

use spotfi_db::repositories::{
    DisconnectRepository, PlanRepository, RadiusRepository, RouterRepository, SessionRepository, UsageRepository,
    UserRepository,
};

use crate::config::Config;
use crate::edge::EdgeFabric;
use crate::es::EphemeralStore;
use crate::quota::ReconcileQueue;

/// Shared application state: one `Arc`-wrapped handle per subsystem,
/// cloned cheaply into every axum handler and background task.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub edge: Arc<EdgeFabric>,
    pub es: EphemeralStore,

    pub routers: RouterRepository,
    pub users: UserRepository,
    pub plans: PlanRepository,
    pub sessions: SessionRepository,
    pub usage: UsageRepository,
    pub disconnects: DisconnectRepository,
    pub radius: RadiusRepository,

    pub reconcile_queue: Arc<ReconcileQueue>,
}
