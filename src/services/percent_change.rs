//! On-demand percent change per (symbol, interval) with interval-specific TTLs.

use crate::config::TtlTable;
use crate::error::{AppError, Result};
use crate::services::cache::TtlCache;
use crate::sources::KlineSource;
use dashmap::DashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

type Key = (String, String);

/// Percent change between the last two closes.
pub fn percent_change(closes: &[f64]) -> Result<f64> {
    let [.., previous, last] = closes else {
        return Err(AppError::InsufficientData {
            needed: 2,
            got: closes.len(),
        });
    };
    if *previous == 0.0 {
        return Err(AppError::DivisionByZero);
    }
    Ok((last - previous) / previous * 100.0)
}

/// Removes a key from the in-flight set when the task ends, panics included.
struct PendingGuard {
    cache: Arc<PercentChangeCache>,
    key: Key,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.cache.pending.remove(&self.key);
    }
}

/// TTL cache of percent changes backed by a bounded prefetch pool.
///
/// Each fetch writes only its own key. Expired entries stay readable through
/// [`peek`](Self::peek) until a fetch replaces them.
pub struct PercentChangeCache {
    source: Arc<dyn KlineSource>,
    entries: TtlCache<Key, f64>,
    ttl: TtlTable,
    permits: Arc<Semaphore>,
    /// Keys with a prefetch task queued or running.
    pending: DashSet<Key>,
}

impl PercentChangeCache {
    pub fn new(source: Arc<dyn KlineSource>, ttl: TtlTable, pool_size: usize) -> Self {
        Self {
            source,
            entries: TtlCache::new(),
            ttl,
            permits: Arc::new(Semaphore::new(pool_size.max(1))),
            pending: DashSet::new(),
        }
    }

    fn key(symbol: &str, interval: &str) -> Key {
        (symbol.to_string(), interval.to_string())
    }

    /// Whether a fresh value is cached.
    pub fn is_fresh(&self, symbol: &str, interval: &str) -> bool {
        self.entries.is_fresh(&Self::key(symbol, interval))
    }

    /// Last computed value, fresh or not, without touching the network.
    pub fn peek(&self, symbol: &str, interval: &str) -> Option<f64> {
        self.entries
            .get_with_age(&Self::key(symbol, interval))
            .map(|(value, _)| value)
    }

    /// Cached percent change, recomputed from the two latest closes when the
    /// entry is missing or expired. `None` when the value cannot be computed;
    /// nothing is cached in that case.
    pub async fn fetch(&self, symbol: &str, interval: &str) -> Option<f64> {
        let key = Self::key(symbol, interval);
        if let Some(value) = self.entries.get(&key) {
            return Some(value);
        }

        match self.compute(symbol, interval).await {
            Ok(value) => {
                self.entries.insert(key, value, self.ttl.ttl_for(interval));
                Some(value)
            }
            Err(e) if e.is_transient() => {
                debug!("Percent change unavailable for {} {}: {}", symbol, interval, e);
                None
            }
            Err(e) => {
                warn!("Percent change failed for {} {}: {}", symbol, interval, e);
                None
            }
        }
    }

    async fn compute(&self, symbol: &str, interval: &str) -> Result<f64> {
        let candles = self.source.klines(symbol, interval, 2).await?;
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        percent_change(&closes)
    }

    /// Queue a fetch for every symbol without a fresh entry and return the
    /// number of tasks submitted. Never waits for the tasks; their handles are
    /// dropped and failures only show up in the log.
    pub fn prefetch_async(self: &Arc<Self>, symbols: &[String], interval: &str) -> usize {
        let mut submitted = 0;

        for symbol in symbols {
            let key = Self::key(symbol, interval);
            if self.entries.is_fresh(&key) || !self.pending.insert(key.clone()) {
                continue;
            }

            let guard = PendingGuard {
                cache: Arc::clone(self),
                key,
            };
            let permits = Arc::clone(&self.permits);

            tokio::spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                let (symbol, interval) = &guard.key;
                guard.cache.fetch(symbol, interval).await;
            });
            submitted += 1;
        }

        if submitted > 0 {
            debug!("Submitted {} percent-change prefetches for {}", submitted, interval);
        }
        submitted
    }

    /// Prefetch tasks queued or running.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }
}
