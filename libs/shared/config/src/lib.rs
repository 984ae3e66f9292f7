use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub tenant_directory_url: String,
    pub tenant_directory_api_key: String,
    pub jwt_secret: String,
    pub listen_port: u16,
    pub tenant_cache_ttl_secs: u64,
    pub storage_timeout_secs: u64,
    pub suggestion_horizon_days: i64,
    pub suggestion_count: usize,
    pub revalidate_on_update: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            tenant_directory_url: env::var("TENANT_DIRECTORY_URL").unwrap_or_else(|_| {
                warn!("TENANT_DIRECTORY_URL not set, using empty value");
                String::new()
            }),
            tenant_directory_api_key: env::var("TENANT_DIRECTORY_API_KEY").unwrap_or_else(|_| {
                warn!("TENANT_DIRECTORY_API_KEY not set, using empty value");
                String::new()
            }),
            jwt_secret: env::var("APP_JWT_SECRET").unwrap_or_else(|_| {
                warn!("APP_JWT_SECRET not set, using empty value");
                String::new()
            }),
            listen_port: parse_or("LISTEN_PORT", 3000),
            tenant_cache_ttl_secs: parse_or("TENANT_CACHE_TTL_SECS", 300),
            storage_timeout_secs: parse_or("STORAGE_TIMEOUT_SECS", 15),
            suggestion_horizon_days: parse_or("SUGGESTION_HORIZON_DAYS", 14),
            suggestion_count: parse_or("SUGGESTION_COUNT", 3),
            revalidate_on_update: parse_or("SCHEDULING_REVALIDATE_ON_UPDATE", true),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.tenant_directory_url.is_empty() && !self.jwt_secret.is_empty()
    }
}

fn parse_or<T: std::str::FromStr>(var: &str, default: T) -> T {
    match env::var(var) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has an unparseable value, using default", var);
            default
        }),
        Err(_) => default,
    }
}
