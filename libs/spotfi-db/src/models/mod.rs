pub mod plan;
pub mod router;
pub mod session;
pub mod usage;
pub mod user;

pub use plan::{AssignmentStatus, Plan, PlanAssignment, QuotaType};
pub use router::{Router, RouterDailyUsage, RouterStatus};
pub use session::Session;
pub use usage::{DisconnectJob, DisconnectReason, UsageCounter};
pub use user::{User, UserStatus};
