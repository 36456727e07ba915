pub mod disconnect_repo;
pub mod plan_repo;
pub mod radius_repo;
pub mod router_repo;
pub mod session_repo;
pub mod usage_repo;
pub mod user_repo;

pub use disconnect_repo::DisconnectRepository;
pub use plan_repo::PlanRepository;
pub use radius_repo::RadiusRepository;
pub use router_repo::RouterRepository;
pub use session_repo::SessionRepository;
pub use usage_repo::UsageRepository;
pub use user_repo::UserRepository;
