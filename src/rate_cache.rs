// Hourly cache of USD exchange rates
// A failed refresh serves the previous table when there is one.

use crate::cache_stats::{CacheStats, CacheStatsReport};
use crate::clock::Clock;
use crate::provider::{RateProvider, TransportError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RateFetchError {
    #[error("No exchange rates available: {0}")]
    Unavailable(TransportError),
}

#[derive(Debug, Clone)]
pub struct RateCacheConfig {
    pub ttl: Duration,
}

impl Default for RateCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachedRateTable {
    // Lowercase currency code -> units per USD
    pub rates: Arc<HashMap<String, f64>>,
    pub expires_at_epoch_ms: i64,
}

impl CachedRateTable {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_epoch_ms
    }
}

pub struct RateCache {
    provider: Arc<dyn RateProvider>,
    clock: Arc<dyn Clock>,
    config: RateCacheConfig,
    table: RwLock<Option<CachedRateTable>>,
    refresh_lock: tokio::sync::Mutex<()>,
    stats: CacheStats,
}

impl RateCache {
    pub fn new(
        provider: Arc<dyn RateProvider>,
        clock: Arc<dyn Clock>,
        config: RateCacheConfig,
    ) -> Self {
        Self {
            provider,
            clock,
            config,
            table: RwLock::new(None),
            refresh_lock: tokio::sync::Mutex::new(()),
            stats: CacheStats::default(),
        }
    }

    pub async fn get_rates(&self) -> Result<Arc<HashMap<String, f64>>, RateFetchError> {
        if let Some(rates) = self.fresh_rates() {
            self.stats.record_hit();
            return Ok(rates);
        }
        self.stats.record_miss();

        let _guard = self.refresh_lock.lock().await;
        if let Some(rates) = self.fresh_rates() {
            self.stats.record_hit();
            return Ok(rates);
        }

        match self.provider.fetch_usd_rates().await {
            Ok(fetched) => {
                let rates: HashMap<String, f64> = fetched
                    .into_iter()
                    .map(|(code, rate)| (code.to_lowercase(), rate))
                    .collect();
                debug!(currencies = rates.len(), "Refreshed exchange rate table");

                let rates = Arc::new(rates);
                let ttl_ms = self.config.ttl.as_millis() as i64;
                *self.table.write() = Some(CachedRateTable {
                    rates: Arc::clone(&rates),
                    expires_at_epoch_ms: self.clock.now_epoch_ms() + ttl_ms,
                });
                self.stats.record_refresh();
                Ok(rates)
            }
            Err(e) => {
                self.stats.record_refresh_failure();
                let stale = self.table.read().as_ref().map(|t| Arc::clone(&t.rates));
                match stale {
                    Some(rates) => {
                        warn!(error = %e, "Exchange rate refresh failed, serving stale table");
                        self.stats.record_stale_served();
                        Ok(rates)
                    }
                    None => {
                        warn!(error = %e, "Exchange rate fetch failed with no cached table");
                        Err(RateFetchError::Unavailable(e))
                    }
                }
            }
        }
    }

    pub fn invalidate(&self) {
        *self.table.write() = None;
    }

    pub fn stats(&self) -> CacheStatsReport {
        self.stats.report()
    }

    fn fresh_rates(&self) -> Option<Arc<HashMap<String, f64>>> {
        let now = self.clock.now_epoch_ms();
        self.table
            .read()
            .as_ref()
            .filter(|t| !t.is_expired(now))
            .map(|t| Arc::clone(&t.rates))
    }
}
