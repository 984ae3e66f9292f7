use std::sync::Arc;

use shared_config::AppConfig;

use crate::cache::{InMemoryCache, SharedCache};
use crate::postgrest::{DbError, PostgrestClient};
use crate::tenant::TenantDirectory;

/// Shared application state handed to every router.
pub struct AppState {
    pub config: AppConfig,
    pub directory: TenantDirectory,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let cache: Arc<dyn SharedCache> = Arc::new(InMemoryCache::new());
        Self::with_cache(config, cache)
    }

    pub fn with_cache(config: AppConfig, cache: Arc<dyn SharedCache>) -> Self {
        let directory = TenantDirectory::new(&config, cache);
        Self { config, directory }
    }

    /// Resolve a domain and open its storage client.
    pub async fn tenant(&self, domain: &str) -> Result<PostgrestClient, DbError> {
        self.directory.storage_for(domain).await
    }
}
