use crate::SqliteStore;
use doorbot_core::types::LineCredentials;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CredentialError {
    /// Tenant id absent from the store.
    #[error("tenant not found")]
    TenantNotFound,
    /// Tenant exists but the channel secret or access token is absent/empty.
    #[error("LINE credentials not configured")]
    Missing,
    #[error("credential lookup failed: {0}")]
    Store(#[from] anyhow::Error),
}

struct CachedCredentials {
    credentials: LineCredentials,
    fetched_at: Instant,
}

/// Store-backed credential lookup with a short-TTL cache keyed by tenant id,
/// so a burst of webhook deliveries does not mean a database round-trip each.
/// Settings saves invalidate the entry.
pub struct CredentialResolver {
    store: SqliteStore,
    ttl: Duration,
    cache: tokio::sync::Mutex<HashMap<String, CachedCredentials>>,
}

impl CredentialResolver {
    pub fn new(store: SqliteStore, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            cache: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    pub async fn resolve(&self, tenant_id: &str) -> Result<LineCredentials, CredentialError> {
        {
            let cache = self.cache.lock().await;
            if let Some(entry) = cache.get(tenant_id) {
                if entry.fetched_at.elapsed() <= self.ttl {
                    debug!(tenant_id, "credential cache hit");
                    return Ok(entry.credentials.clone());
                }
            }
        }

        let settings = self
            .store
            .line_settings(tenant_id)
            .await?
            .ok_or(CredentialError::TenantNotFound)?;

        let channel_secret = settings.channel_secret.filter(|s| !s.is_empty());
        let access_token = settings.access_token.filter(|s| !s.is_empty());
        let credentials = match (channel_secret, access_token) {
            (Some(channel_secret), Some(access_token)) => LineCredentials {
                channel_secret,
                access_token,
            },
            _ => return Err(CredentialError::Missing),
        };

        let mut cache = self.cache.lock().await;
        cache.retain(|_, entry| entry.fetched_at.elapsed() <= self.ttl);
        cache.insert(
            tenant_id.to_string(),
            CachedCredentials {
                credentials: credentials.clone(),
                fetched_at: Instant::now(),
            },
        );

        Ok(credentials)
    }

    pub async fn invalidate(&self, tenant_id: &str) {
        self.cache.lock().await.remove(tenant_id);
    }
}
