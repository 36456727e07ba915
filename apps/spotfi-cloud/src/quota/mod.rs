//! Quota & Session Engine (spec.md §4.2). Postgres triggers do the
//! accounting (`trg_usage_exhaustion`, `trg_session_close_delta`); this
//! module reacts to their output — the disconnect work queue, the stale
//! session window, router reconciliation, and plan expiry.

pub mod expiry;
pub mod listener;
pub mod reconciler;
pub mod sweeper;
pub mod worker;

pub use expiry::PlanExpiryJob;
pub use listener::NotificationListener;
pub use reconciler::ReconcileQueue;
pub use sweeper::StaleSessionSweeper;
pub use worker::DisconnectWorkerPool;
