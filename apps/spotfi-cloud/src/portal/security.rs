//! Security guards for the UAM surface (spec.md §4.3 "Security guards"):
//! an open-redirect allow-list, RFC 1918/link-local validation of the
//! router-supplied `uamip`, and the security headers every response
//! carries.

use std::net::Ipv4Addr;

use axum::http::{HeaderName, HeaderValue};

/// Accepts only same-origin-relative paths or hosts on the configured
/// allow-list, rejecting absolute URLs to anywhere else (spec.md §4.3:
/// "the portal MUST NOT become an open redirector").
pub fn validate_redirect(target: &str, allowed_domains: &[String]) -> bool {
    if target.starts_with("//") {
        return false;
    }
    if target.starts_with('/') {
        return true;
    }

    match url::Url::parse(target) {
        Ok(url) => match url.host_str() {
            Some(host) => allowed_domains.iter().any(|d| d == host || host.ends_with(&format!(".{d}"))),
            None => false,
        },
        Err(_) => false,
    }
}

/// `uamip` must be a router-reachable private address unless the
/// operator explicitly opted into public addresses for testing (spec.md
/// §4.3 "Router-IP validation").
pub fn validate_uamip(uamip: &str, allow_public: bool) -> bool {
    let Ok(ip) = uamip.parse::<Ipv4Addr>() else { return false };
    if allow_public {
        return true;
    }
    ip.is_private() || ip.is_link_local() || ip.is_loopback()
}

/// Minimal HTML escaping for values interpolated into the login page
/// (spec.md §4.3: reflected router/query parameters must be escaped).
pub fn escape_html(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '&' => "&amp;".to_string(),
            '<' => "&lt;".to_string(),
            '>' => "&gt;".to_string(),
            '"' => "&quot;".to_string(),
            '\'' => "&#39;".to_string(),
            other => other.to_string(),
        })
        .collect()
}

/// Applied to every response from the portal surface (spec.md §4.3
/// "Security headers").
pub fn security_headers() -> Vec<(HeaderName, HeaderValue)> {
    vec![
        (HeaderName::from_static("content-security-policy"), HeaderValue::from_static("default-src 'self'")),
        (HeaderName::from_static("x-content-type-options"), HeaderValue::from_static("nosniff")),
        (HeaderName::from_static("x-frame-options"), HeaderValue::from_static("DENY")),
        (
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ),
        (
            HeaderName::from_static("permissions-policy"),
            HeaderValue::from_static("camera=(), microphone=(), geolocation=()"),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_are_always_allowed() {
        assert!(validate_redirect("/connected", &[]));
    }

    #[test]
    fn protocol_relative_urls_are_rejected() {
        assert!(!validate_redirect("//evil.example.com/phish", &[]));
    }

    #[test]
    fn absolute_urls_require_the_allow_list() {
        let allowed = vec!["spotfi.example.net".to_string()];
        assert!(validate_redirect("https://spotfi.example.net/connected", &allowed));
        assert!(validate_redirect("https://portal.spotfi.example.net/x", &allowed));
        assert!(!validate_redirect("https://evil.example.com", &allowed));
    }

    #[test]
    fn uamip_rejects_public_addresses_by_default() {
        assert!(validate_uamip("192.168.1.1", false));
        assert!(validate_uamip("10.0.0.1", false));
        assert!(!validate_uamip("8.8.8.8", false));
        assert!(validate_uamip("8.8.8.8", true));
    }

    #[test]
    fn escapes_the_five_reserved_characters() {
        assert_eq!(escape_html(r#"<a href="x">'&'</a>"#), "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;");
    }
}
