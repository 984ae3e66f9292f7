use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use shared_config::AppConfig;

use crate::cache::SharedCache;
use crate::postgrest::{DbError, PostgrestClient};

/// Everything needed to reach one tenant's storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantHandle {
    pub domain: String,
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
}

/// Resolves a customer domain to its storage handle through the central
/// `tenants` table. Resolved handles are kept in the injected cache for a
/// bounded TTL so repeated bookings do not hit the directory on every call.
pub struct TenantDirectory {
    directory: PostgrestClient,
    cache: Arc<dyn SharedCache>,
    cache_ttl: Duration,
    storage_timeout_secs: u64,
}

impl TenantDirectory {
    pub fn new(config: &AppConfig, cache: Arc<dyn SharedCache>) -> Self {
        Self {
            directory: PostgrestClient::new(
                config.tenant_directory_url.clone(),
                config.tenant_directory_api_key.clone(),
                config.storage_timeout_secs,
            ),
            cache,
            cache_ttl: Duration::from_secs(config.tenant_cache_ttl_secs),
            storage_timeout_secs: config.storage_timeout_secs,
        }
    }

    /// Resolve a domain to a tenant handle, trying the exact domain, then a
    /// bare name with ".com" appended, then a prefix match.
    pub async fn resolve(&self, domain: &str) -> Result<TenantHandle, DbError> {
        let normalized = domain.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(DbError::NotFound("empty domain".to_string()));
        }

        let cache_key = format!("tenant:{}", normalized);
        if let Some(cached) = self.cache.get(&cache_key).await {
            match serde_json::from_str::<TenantHandle>(&cached) {
                Ok(handle) => {
                    debug!("tenant '{}' served from cache", normalized);
                    return Ok(handle);
                }
                Err(e) => {
                    warn!("discarding unreadable cached tenant entry: {}", e);
                    self.cache.invalidate(&cache_key).await;
                }
            }
        }

        let handle = self.lookup(&normalized).await?;

        if let Ok(serialized) = serde_json::to_string(&handle) {
            self.cache.put(&cache_key, serialized, self.cache_ttl).await;
        }

        Ok(handle)
    }

    /// Open a storage client for the given domain.
    pub async fn storage_for(&self, domain: &str) -> Result<PostgrestClient, DbError> {
        let handle = self.resolve(domain).await?;
        Ok(PostgrestClient::for_tenant(&handle, self.storage_timeout_secs))
    }

    async fn lookup(&self, domain: &str) -> Result<TenantHandle, DbError> {
        if let Some(handle) = self.query_exact(domain).await? {
            return Ok(handle);
        }

        if !domain.contains('.') {
            let with_tld = format!("{}.com", domain);
            if let Some(handle) = self.query_exact(&with_tld).await? {
                return Ok(handle);
            }
        }

        if let Some(handle) = self.query_prefix(domain).await? {
            return Ok(handle);
        }

        Err(DbError::NotFound(domain.to_string()))
    }

    async fn query_exact(&self, domain: &str) -> Result<Option<TenantHandle>, DbError> {
        let path = format!(
            "/rest/v1/tenants?domain=eq.{}&limit=1",
            urlencoding::encode(domain)
        );
        let rows: Vec<TenantHandle> = self.directory.request(Method::GET, &path, None, None).await?;
        Ok(rows.into_iter().next())
    }

    async fn query_prefix(&self, domain: &str) -> Result<Option<TenantHandle>, DbError> {
        let path = format!(
            "/rest/v1/tenants?domain=ilike.{}*&order=domain.asc&limit=1",
            urlencoding::encode(domain)
        );
        let rows: Vec<TenantHandle> = self.directory.request(Method::GET, &path, None, None).await?;
        Ok(rows.into_iter().next())
    }
}
