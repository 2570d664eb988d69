//! Integration tests for the percent-change cache and its prefetch pool

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use trendgrid::config::TtlTable;
use trendgrid::error::{AppError, Result};
use trendgrid::services::PercentChangeCache;
use trendgrid::sources::KlineSource;
use trendgrid::types::Candle;

fn candles(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Candle {
            open_time: i as i64 * 3_600_000,
            open: close,
            high: close,
            low: close,
            close,
        })
        .collect()
}

/// Serves fixed closes and counts calls.
struct FixedKlines {
    closes: Vec<f64>,
    calls: AtomicUsize,
}

impl FixedKlines {
    fn new(closes: &[f64]) -> Arc<Self> {
        Arc::new(Self {
            closes: closes.to_vec(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl KlineSource for FixedKlines {
    async fn klines(&self, _symbol: &str, _interval: &str, _limit: usize) -> Result<Vec<Candle>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(candles(&self.closes))
    }
}

/// Blocks every call until the test opens the gate.
struct GatedKlines {
    gate: Semaphore,
    calls: AtomicUsize,
}

#[async_trait]
impl KlineSource for GatedKlines {
    async fn klines(&self, _symbol: &str, _interval: &str, _limit: usize) -> Result<Vec<Candle>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| AppError::ExternalApi("gate closed".into()))?;
        Ok(candles(&[200.0, 210.0]))
    }
}

struct Unreachable;

#[async_trait]
impl KlineSource for Unreachable {
    async fn klines(&self, _symbol: &str, _interval: &str, _limit: usize) -> Result<Vec<Candle>> {
        Err(AppError::ExternalApi("connection refused".into()))
    }
}

fn symbols(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("COIN{}USDT", i)).collect()
}

#[tokio::test]
async fn test_two_fetches_within_ttl_hit_network_once() {
    let source = FixedKlines::new(&[100.0, 102.5]);
    let cache = PercentChangeCache::new(source.clone(), TtlTable::default(), 8);

    let first = cache.fetch("BTCUSDT", "1h").await;
    let second = cache.fetch("BTCUSDT", "1h").await;

    assert_eq!(first, second);
    assert!((first.unwrap() - 2.5).abs() < 1e-9);
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_intervals_are_cached_separately() {
    let source = FixedKlines::new(&[100.0, 90.0]);
    let cache = PercentChangeCache::new(source.clone(), TtlTable::default(), 8);

    cache.fetch("BTCUSDT", "1h").await;
    cache.fetch("BTCUSDT", "4h").await;

    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    assert!((cache.peek("BTCUSDT", "4h").unwrap() + 10.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_single_point_returns_none() {
    let source = FixedKlines::new(&[100.0]);
    let cache = PercentChangeCache::new(source.clone(), TtlTable::default(), 8);

    assert_eq!(cache.fetch("NEWUSDT", "1d").await, None);
    assert!(!cache.is_fresh("NEWUSDT", "1d"));

    // Nothing cached, so the next call asks again
    cache.fetch("NEWUSDT", "1d").await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_network_failure_returns_none() {
    let cache = PercentChangeCache::new(Arc::new(Unreachable), TtlTable::default(), 8);
    assert_eq!(cache.fetch("BTCUSDT", "5m").await, None);
    assert_eq!(cache.peek("BTCUSDT", "5m"), None);
}

#[tokio::test]
async fn test_prefetch_submits_one_task_per_symbol_and_returns_immediately() {
    let source = Arc::new(GatedKlines {
        gate: Semaphore::new(0),
        calls: AtomicUsize::new(0),
    });
    let cache = Arc::new(PercentChangeCache::new(source.clone(), TtlTable::default(), 8));
    let symbols = symbols(10);

    let submitted = cache.prefetch_async(&symbols, "1h");

    assert_eq!(submitted, 10);
    assert!(symbols.iter().all(|s| !cache.is_fresh(s, "1h")));
    assert_eq!(cache.in_flight(), 10);

    // Already queued symbols are not submitted twice
    assert_eq!(cache.prefetch_async(&symbols, "1h"), 0);

    source.gate.add_permits(10);
    tokio::time::timeout(Duration::from_secs(2), async {
        while !symbols.iter().all(|s| cache.is_fresh(s, "1h")) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("prefetch tasks should complete");

    assert_eq!(source.calls.load(Ordering::SeqCst), 10);
    assert!((cache.peek("COIN3USDT", "1h").unwrap() - 5.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_prefetch_pool_is_bounded() {
    let source = Arc::new(GatedKlines {
        gate: Semaphore::new(0),
        calls: AtomicUsize::new(0),
    });
    let cache = Arc::new(PercentChangeCache::new(source.clone(), TtlTable::default(), 3));

    assert_eq!(cache.prefetch_async(&symbols(10), "15m"), 10);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 3);

    source.gate.add_permits(10);
    tokio::time::timeout(Duration::from_secs(2), async {
        while cache.in_flight() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("queued tasks should drain");
    assert_eq!(source.calls.load(Ordering::SeqCst), 10);
}

#[tokio::test]
async fn test_prefetch_retries_expired_entries() {
    let source = FixedKlines::new(&[10.0, 11.0]);
    let cache = Arc::new(PercentChangeCache::new(
        source.clone(),
        TtlTable::uniform(Duration::from_millis(20)),
        2,
    ));
    let symbols = symbols(2);

    cache.fetch(&symbols[0], "1h").await;
    cache.fetch(&symbols[1], "1h").await;
    assert_eq!(cache.prefetch_async(&symbols, "1h"), 0);

    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(cache.prefetch_async(&symbols, "1h"), 2);
}
