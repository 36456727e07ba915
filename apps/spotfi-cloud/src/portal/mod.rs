//! Captive-Portal Authorization Pipeline (spec.md §4.3): the HTTP
//! surface a router's UAM redirect lands a freshly-associated client on.

pub mod handlers;
pub mod radius_client;
pub mod router_resolution;
pub mod security;
pub mod whitelist;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/uam/login", get(handlers::login_form).post(handlers::login_submit))
        .route("/uam/logout", get(handlers::logout))
}
