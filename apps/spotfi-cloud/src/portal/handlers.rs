//! UAM login/logout handlers (spec.md §4.3 "Captive-Portal Authorization
//! Pipeline"): a GET that renders a form pre-filled with the router's
//! query parameters, and a POST that validates, delegates to RADIUS, and
//! redirects the client back to the router's local `uamip` logon
//! endpoint. Exit codes follow spec.md §6: 200 form, 302 redirect, 400
//! invalid params, 401 auth failed, 403 router-not-found, 429
//! rate-limited.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;
use tracing::{info, warn};

use spotfi_shared::chap;

use super::radius_client::{self, AccessRequest};
use super::router_resolution::{self, UamParams};
use super::security;
use crate::state::AppState;

const LOGIN_ATTEMPT_LIMIT: u64 = 5;
const LOGIN_ATTEMPT_WINDOW_SECS: u64 = 15 * 60;
const LOGIN_BLOCK_SECS: u64 = 30 * 60;

/// spec.md §4.3 "Redirect-loop detection": more than this many login
/// attempts for the same UAM session within the window is treated as the
/// client bouncing off a broken redirect rather than a real retry.
const REDIRECT_LOOP_LIMIT: u64 = 5;
const REDIRECT_LOOP_WINDOW_SECS: u64 = 30;

/// Generic message for every authentication failure, regardless of
/// whether the router was unrecognized or the credentials were rejected
/// (spec.md §7: a distinguishing message would let an attacker enumerate
/// routers or valid usernames).
const AUTH_FAILED_MESSAGE: &str = "Authentication failed.";

/// Query parameters a UAM-compliant router appends to the redirect it
/// sends an unauthenticated client to (spec.md §4.3 "UAM redirect").
#[derive(Debug, Deserialize)]
pub struct UamQuery {
    pub res: Option<String>,
    pub uamip: Option<String>,
    pub uamport: Option<String>,
    pub challenge: Option<String>,
    pub called: Option<String>,
    pub mac: Option<String>,
    pub nasid: Option<String>,
    pub userurl: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub uamip: Option<String>,
    pub uamport: Option<String>,
    pub challenge: Option<String>,
    pub called: Option<String>,
    pub nasid: Option<String>,
    pub userurl: Option<String>,
}

pub async fn login_form(State(_state): State<AppState>, Query(query): Query<UamQuery>) -> impl IntoResponse {
    let challenge = query.challenge.as_deref().unwrap_or_default();
    let uamip = query.uamip.as_deref().unwrap_or_default();
    let uamport = query.uamport.as_deref().unwrap_or_default();
    let called = query.called.as_deref().unwrap_or_default();
    let nasid = query.nasid.as_deref().unwrap_or_default();
    let userurl = query.userurl.as_deref().unwrap_or_default();

    let body = format!(
        r#"<!doctype html>
<html><body>
<form method="post" action="/uam/login">
  <input type="hidden" name="uamip" value="{uamip}">
  <input type="hidden" name="uamport" value="{uamport}">
  <input type="hidden" name="challenge" value="{challenge}">
  <input type="hidden" name="called" value="{called}">
  <input type="hidden" name="nasid" value="{nasid}">
  <input type="hidden" name="userurl" value="{userurl}">
  <input type="text" name="username">
  <input type="password" name="password">
  <button type="submit">Connect</button>
</form>
</body></html>"#,
        uamip = security::escape_html(uamip),
        uamport = security::escape_html(uamport),
        challenge = security::escape_html(challenge),
        called = security::escape_html(called),
        nasid = security::escape_html(nasid),
        userurl = security::escape_html(userurl),
    );
    Html(body)
}

pub async fn login_submit(
    State(state): State<AppState>,
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
    axum::extract::Form(form): axum::extract::Form<LoginForm>,
) -> Response {
    let source_ip = peer_addr.ip().to_string();
    // Keyed on the client's source address, not the submitted username:
    // keying on username lets an attacker rotate usernames to dodge the
    // limit, or lock out a victim just by knowing their name (spec.md
    // §4.3 "Rate limiting").
    let rate_identity = form.called.clone().unwrap_or_else(|| source_ip.clone());
    let rate_key = format!("uam:login:{rate_identity}");
    let block_key = format!("uam:block:{rate_identity}");

    match state.es.exists(&block_key).await {
        Ok(true) => return too_many_requests(),
        Ok(false) => {}
        Err(e) => warn!(error = %e, "uam login: rate limit block check failed, proceeding without it"),
    }

    match state.es.check_rate_limit(&rate_key, LOGIN_ATTEMPT_LIMIT, LOGIN_ATTEMPT_WINDOW_SECS).await {
        Ok(true) => {}
        Ok(false) => {
            if let Err(e) = state.es.set_with_ttl(&block_key, "1", LOGIN_BLOCK_SECS).await {
                warn!(error = %e, "uam login: failed to set block key");
            }
            return too_many_requests();
        }
        Err(e) => {
            warn!(error = %e, "uam login: rate limit check failed, proceeding without it");
        }
    }

    if let Some(diagnostic) = check_redirect_loop(&state, form.challenge.as_deref()).await {
        return diagnostic;
    }

    let params = UamParams {
        called: form.called.as_deref(),
        nasid: form.nasid.as_deref(),
        source_ip: Some(source_ip.as_str()),
    };
    let router = match router_resolution::resolve(&state.routers, &params).await {
        Ok(Some(router)) => router,
        Ok(None) => return auth_failed(StatusCode::FORBIDDEN),
        Err(e) => {
            warn!(error = %e, "uam login: router resolution failed");
            return err(StatusCode::INTERNAL_SERVER_ERROR, "Internal error.");
        }
    };

    let nas_ip = router.nas_ip_address.as_deref().and_then(|ip| ip.parse().ok());
    let request = AccessRequest {
        username: &form.username,
        password: &form.password,
        nas_ip_address: nas_ip,
        called_station_id: Some(&router.id),
        calling_station_id: form.called.as_deref(),
    };

    let accepted = match radius_client::authenticate(&state.config.radius_host, &router.radius_secret, request).await {
        Ok(accepted) => accepted,
        Err(e) => {
            warn!(error = %e, "uam login: radius access-request failed");
            return err(StatusCode::INTERNAL_SERVER_ERROR, "Authentication service unavailable.");
        }
    };

    if !accepted {
        info!(username = form.username, router_id = router.id, "uam login rejected by radius");
        return auth_failed(StatusCode::UNAUTHORIZED);
    }

    let Some(uamip) = form.uamip.as_deref() else {
        return err(StatusCode::BAD_REQUEST, "Missing router callback address.");
    };
    if !security::validate_uamip(uamip, state.config.allow_public_uamip) {
        warn!(uamip, "uam login: rejected non-private uamip");
        return err(StatusCode::BAD_REQUEST, "Invalid router address.");
    }

    let challenge = form.challenge.as_deref().unwrap_or_default();
    let response_hex = match chap::response_hex(0x00, &router.uam_secret, challenge) {
        Ok(hex) => hex,
        Err(e) => {
            warn!(error = %e, "uam login: chap response computation failed");
            return err(StatusCode::INTERNAL_SERVER_ERROR, "Internal error.");
        }
    };

    // A present-but-invalid userurl (e.g. `javascript:alert(1)`) falls
    // back to the configured default instead of failing the login: the
    // default is only a "nothing supplied" fallback, not a validation
    // escape hatch (spec.md §4.3 scenario "redirect target validation").
    let requested_userurl = form.userurl.as_deref().unwrap_or(&state.config.default_redirect_url);
    let userurl = if security::validate_redirect(requested_userurl, &state.config.redirect_allow_list()) {
        requested_userurl
    } else {
        warn!(userurl = requested_userurl, "uam login: disallowed redirect target, substituting default");
        state.config.default_redirect_url.as_str()
    };

    let uamport = form.uamport.as_deref().unwrap_or("3990");
    let logon_url = format!(
        "http://{uamip}:{uamport}/logon?username={username}&response={response}&userurl={userurl}",
        username = percent_encode(&form.username),
        response = response_hex,
        userurl = percent_encode(userurl),
    );

    info!(username = form.username, router_id = router.id, "uam login accepted");
    Redirect::to(&logon_url).into_response()
}

pub async fn logout() -> impl IntoResponse {
    Html("<p>Logged out.</p>".to_string())
}

/// Tracks login attempts per UAM session (keyed on the router-issued
/// `challenge`, unique per handshake) and short-circuits to a diagnostic
/// page once a client bounces through more than
/// [`REDIRECT_LOOP_LIMIT`] attempts inside [`REDIRECT_LOOP_WINDOW_SECS`]
/// (spec.md §4.3 "Redirect-loop detection").
async fn check_redirect_loop(state: &AppState, challenge: Option<&str>) -> Option<Response> {
    let challenge = challenge.filter(|c| !c.is_empty())?;
    let loop_key = format!("uam:redirect-loop:{challenge}");
    match state.es.check_rate_limit(&loop_key, REDIRECT_LOOP_LIMIT, REDIRECT_LOOP_WINDOW_SECS).await {
        Ok(true) => None,
        Ok(false) => {
            warn!(challenge, "uam login: redirect loop detected");
            Some(err(
                StatusCode::BAD_REQUEST,
                "Redirect loop detected. Please reconnect to the Wi-Fi network and try again.",
            ))
        }
        Err(e) => {
            warn!(error = %e, "uam login: redirect loop check failed, proceeding without it");
            None
        }
    }
}

fn auth_failed(status: StatusCode) -> Response {
    err(status, AUTH_FAILED_MESSAGE)
}

fn too_many_requests() -> Response {
    err(StatusCode::TOO_MANY_REQUESTS, "Too many attempts. Try again later.")
}

fn err(status: StatusCode, message: &'static str) -> Response {
    (status, Html(format!("<p>{message}</p>"))).into_response()
}

fn percent_encode(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}
