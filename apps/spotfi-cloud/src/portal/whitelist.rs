//! Pre-auth walled-garden allow-list (spec.md §4.3 "Whitelist
//! derivation"): the fixed set of DNS/NTP/vendor-portal destinations a
//! captive client must reach before authenticating, plus a generator
//! that turns a deployment's portal URL, DNS/NTP servers, and router UAM
//! IP into the domains/IPs to allow and the ipset commands that install
//! them on the edge's firewall.

pub const DNS_SERVERS: &[&str] = &["1.1.1.1", "8.8.8.8"];
pub const NTP_SERVERS: &[&str] = &["pool.ntp.org"];

/// Vendor OS-detection domains (Apple/Android/Windows captive-portal
/// probes) that must resolve even before the splash page loads, or the
/// client's own OS will never surface the portal to the user.
pub const VENDOR_PROBE_DOMAINS: &[&str] = &[
    "captive.apple.com",
    "connectivitycheck.gstatic.com",
    "www.msftconnecttest.com",
];

const IPSET_NAME: &str = "spotfi-walled-garden";

/// Output of [`generate`]: the domains and IPs a client must be able to
/// reach pre-auth, and the shell commands that install them into the
/// edge's `ipset`-backed firewall allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalledGardenPlan {
    pub domains: Vec<String>,
    pub ips: Vec<String>,
    pub install_commands: Vec<String>,
}

/// Builds the walled-garden plan for one deployment (spec.md §4.3
/// "Whitelist derivation"): vendor OS probes and NTP servers always
/// apply; the portal's own host, the configured DNS resolvers, and the
/// router's UAM IP are added so the splash page and the UAM handshake
/// itself stay reachable before the client authenticates.
pub fn generate(portal_url: &str, dns_servers: &[&str], ntp_servers: &[&str], uam_ip: &str) -> WalledGardenPlan {
    let mut domains: Vec<String> = VENDOR_PROBE_DOMAINS.iter().map(|d| d.to_string()).collect();
    domains.extend(ntp_servers.iter().map(|s| s.to_string()));
    if let Some(host) = portal_host(portal_url) {
        domains.push(host);
    }

    let mut ips: Vec<String> = dns_servers.iter().map(|s| s.to_string()).collect();
    if !uam_ip.is_empty() {
        ips.push(uam_ip.to_string());
    }

    let mut install_commands = vec![format!("ipset create -exist {IPSET_NAME} hash:ip,port")];
    for ip in &ips {
        install_commands.push(format!("ipset add -exist {IPSET_NAME} {ip}"));
    }
    install_commands.push(format!(
        "iptables -I FORWARD -m set --match-set {IPSET_NAME} dst -j ACCEPT"
    ));

    WalledGardenPlan { domains, ips, install_commands }
}

fn portal_host(portal_url: &str) -> Option<String> {
    url::Url::parse(portal_url).ok().and_then(|u| u.host_str().map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walled_garden_includes_vendor_probes() {
        let plan = generate("https://portal.spotfi.example.net", DNS_SERVERS, NTP_SERVERS, "10.1.0.1");
        assert!(plan.domains.contains(&"captive.apple.com".to_string()));
    }

    #[test]
    fn includes_dns_servers_and_uam_ip_in_the_ip_set() {
        let plan = generate("https://portal.spotfi.example.net", DNS_SERVERS, NTP_SERVERS, "10.1.0.1");
        assert!(plan.ips.contains(&"1.1.1.1".to_string()));
        assert!(plan.ips.contains(&"10.1.0.1".to_string()));
    }

    #[test]
    fn includes_the_portal_host_and_ntp_servers_in_the_domain_list() {
        let plan = generate("https://portal.spotfi.example.net", DNS_SERVERS, NTP_SERVERS, "10.1.0.1");
        assert!(plan.domains.contains(&"portal.spotfi.example.net".to_string()));
        assert!(plan.domains.contains(&"pool.ntp.org".to_string()));
    }

    #[test]
    fn emits_an_ipset_create_and_one_add_per_ip() {
        let plan = generate("https://portal.spotfi.example.net", DNS_SERVERS, NTP_SERVERS, "10.1.0.1");
        assert_eq!(plan.install_commands[0], "ipset create -exist spotfi-walled-garden hash:ip,port");
        assert_eq!(plan.install_commands.len(), plan.ips.len() + 2);
    }
}
