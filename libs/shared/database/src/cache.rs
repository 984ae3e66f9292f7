use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

/// Expiring key-value store used for cross-request state such as resolved
/// tenant handles. Injected rather than global so a shared/distributed
/// implementation can replace the in-memory one under multi-instance
/// deployment.
#[async_trait]
pub trait SharedCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn put(&self, key: &str, value: String, ttl: Duration);
    async fn invalidate(&self, key: &str);
}

#[derive(Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SharedCache for InMemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some((value, deadline)) if Instant::now() < *deadline => {
                    return Some(value.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }

        // Entry exists but expired; drop it.
        self.entries.write().await.remove(key);
        None
    }

    async fn put(&self, key: &str, value: String, ttl: Duration) {
        let deadline = Instant::now() + ttl;
        self.entries
            .write()
            .await
            .insert(key.to_string(), (value, deadline));
    }

    async fn invalidate(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}
