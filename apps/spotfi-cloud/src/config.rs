use clap::Args;

/// Environment-derived settings (spec.md §6 "Configuration"). Every field
/// is overridable by its env var via `clap(env)`.
#[derive(Debug, Clone, Args)]
pub struct Config {
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    #[arg(long, env = "BROKER_URL", default_value = "mqtt://127.0.0.1:1883")]
    pub broker_url: String,

    #[arg(long, env = "BROKER_USERNAME", default_value = "spotfi-cloud")]
    pub broker_username: String,

    #[arg(long, env = "BROKER_PASSWORD", default_value = "")]
    pub broker_password: String,

    /// Identifies this process among horizontally-scaled peers so RPC
    /// request ids can be prefixed for correlation (spec.md §4.1). Left
    /// unset in most deployments: a random id is generated at startup.
    #[arg(long, env = "INSTANCE_ID")]
    pub instance_id: Option<String>,

    #[arg(long, env = "PORTAL_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub portal_bind_addr: String,

    #[arg(long, env = "DEFAULT_REDIRECT_URL", default_value = "https://spotfi.example.net/connected")]
    pub default_redirect_url: String,

    /// Comma-separated host allow-list for user-supplied redirect targets
    /// (spec.md §4.3 "Security guards").
    #[arg(long, env = "REDIRECT_ALLOWED_DOMAINS", default_value = "")]
    pub redirect_allowed_domains: String,

    /// Permits public (non-RFC1918) `uamip` values — testing only
    /// (spec.md §4.3 "Router-IP validation").
    #[arg(long, env = "ALLOW_PUBLIC_UAMIP", default_value_t = false)]
    pub allow_public_uamip: bool,

    /// RADIUS host used for Access-Request delegation (spec.md §4.3 step 3).
    #[arg(long, env = "RADIUS_HOST", default_value = "127.0.0.1:1812")]
    pub radius_host: String,

    /// Disabled-by-default polling fallback for the quota engine
    /// (spec.md §9 REDESIGN FLAG — notification-driven is primary).
    #[arg(long, env = "QUOTA_POLL_FALLBACK_ENABLED", default_value_t = false)]
    pub quota_poll_fallback_enabled: bool,
}

impl Config {
    pub fn redirect_allow_list(&self) -> Vec<String> {
        self.redirect_allowed_domains
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}
