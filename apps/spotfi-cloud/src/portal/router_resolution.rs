//! Router identity resolution (spec.md §4.3): the UAM login request
//! carries whatever mix of `called` (router MAC), NAS identifier/name,
//! and source IP the router's firmware happens to send. Resolution
//! tries MAC, then name, then NAS IP, in that order, and stops at the
//! first hit.

use spotfi_db::models::Router;
use spotfi_db::repositories::RouterRepository;
use spotfi_shared::normalize::{normalize_mac, normalize_name};

pub struct UamParams<'a> {
    pub called: Option<&'a str>,
    pub nasid: Option<&'a str>,
    pub source_ip: Option<&'a str>,
}

pub async fn resolve(routers: &RouterRepository, params: &UamParams<'_>) -> anyhow::Result<Option<Router>> {
    if let Some(called) = params.called {
        let mac = normalize_mac(called);
        if !mac.is_empty() {
            if let Some(router) = routers.find_by_mac(&mac).await? {
                return Ok(Some(router));
            }
        }
    }

    if let Some(nasid) = params.nasid {
        let name = normalize_name(nasid);
        if !name.is_empty() {
            if let Some(router) = routers.find_by_normalized_name(&name).await? {
                return Ok(Some(router));
            }
        }
    }

    if let Some(ip) = params.source_ip {
        if let Some(router) = routers.find_by_nas_ip(ip).await? {
            return Ok(Some(router));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_with_nothing_set_resolve_to_skip_all_three_steps() {
        let params = UamParams { called: None, nasid: None, source_ip: None };
        assert!(params.called.is_none() && params.nasid.is_none() && params.source_ip.is_none());
    }
}
