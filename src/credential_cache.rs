// Cached bearer token for the inventory provider
// Holds at most one credential and refreshes it via the client-credentials grant once it
// is within the safety buffer of expiring.

use crate::cache_stats::{CacheStats, CacheStatsReport};
use crate::clock::Clock;
use crate::provider::{AuthProvider, TransportError};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("Credential exchange failed: {0}")]
    Exchange(TransportError),

    #[error("Auth provider rejected credentials: {status} - {message}")]
    Rejected { status: u16, message: String },
}

impl From<TransportError> for AuthError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Status { status, message } => AuthError::Rejected { status, message },
            other => AuthError::Exchange(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CredentialCacheConfig {
    // Subtracted from the provider's reported lifetime
    pub expiry_buffer: Duration,
}

impl Default for CredentialCacheConfig {
    fn default() -> Self {
        Self {
            expiry_buffer: Duration::from_secs(1800),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachedCredential {
    pub token: String,
    pub expires_at_epoch_ms: i64,
}

impl CachedCredential {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_epoch_ms
    }
}

pub struct CredentialCache {
    provider: Arc<dyn AuthProvider>,
    clock: Arc<dyn Clock>,
    config: CredentialCacheConfig,
    cached: RwLock<Option<CachedCredential>>,
    // Concurrent misses wait here so only one exchange is in flight
    refresh_lock: tokio::sync::Mutex<()>,
    stats: CacheStats,
}

impl CredentialCache {
    pub fn new(
        provider: Arc<dyn AuthProvider>,
        clock: Arc<dyn Clock>,
        config: CredentialCacheConfig,
    ) -> Self {
        Self {
            provider,
            clock,
            config,
            cached: RwLock::new(None),
            refresh_lock: tokio::sync::Mutex::new(()),
            stats: CacheStats::default(),
        }
    }

    pub async fn get_token(&self) -> Result<String, AuthError> {
        if let Some(token) = self.fresh_token() {
            self.stats.record_hit();
            return Ok(token);
        }
        self.stats.record_miss();

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited
        if let Some(token) = self.fresh_token() {
            self.stats.record_hit();
            return Ok(token);
        }

        debug!("Exchanging client credentials for a new access token");
        let response = match self.provider.exchange_client_credentials().await {
            Ok(response) => response,
            Err(e) => {
                self.stats.record_refresh_failure();
                warn!(error = %e, "Client credentials exchange failed");
                return Err(e.into());
            }
        };

        let buffer_secs = self.config.expiry_buffer.as_secs() as i64;
        let usable_secs = (response.expires_in - buffer_secs).max(0);
        let credential = CachedCredential {
            token: response.access_token,
            expires_at_epoch_ms: self.clock.now_epoch_ms() + usable_secs * 1000,
        };
        info!(
            expires_in = response.expires_in,
            usable_secs, "Cached new access token"
        );

        let token = credential.token.clone();
        *self.cached.write() = Some(credential);
        self.stats.record_refresh();
        Ok(token)
    }

    // Drop the cached token, e.g. after the provider answers 401 with it
    pub fn invalidate(&self) {
        *self.cached.write() = None;
    }

    pub fn cached(&self) -> Option<CachedCredential> {
        self.cached.read().clone()
    }

    pub fn stats(&self) -> CacheStatsReport {
        self.stats.report()
    }

    fn fresh_token(&self) -> Option<String> {
        let now = self.clock.now_epoch_ms();
        self.cached
            .read()
            .as_ref()
            .filter(|c| !c.is_expired(now))
            .map(|c| c.token.clone())
    }
}
