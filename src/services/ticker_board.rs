use crate::services::signal_cache::wait_or_stop;
use crate::sources::TickerSource;
use crate::types::Ticker24h;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Latest 24h price, change and volume per symbol of the universe.
pub struct TickerBoard {
    symbols: HashSet<String>,
    tickers: DashMap<String, Ticker24h>,
}

impl TickerBoard {
    pub fn new(symbols: &[String]) -> Self {
        Self {
            symbols: symbols.iter().cloned().collect(),
            tickers: DashMap::new(),
        }
    }

    pub fn get(&self, symbol: &str) -> Option<Ticker24h> {
        self.tickers.get(symbol).map(|t| t.clone())
    }

    /// 24h quote volume, 0 when unknown.
    pub fn quote_volume(&self, symbol: &str) -> f64 {
        self.tickers
            .get(symbol)
            .map(|t| t.quote_volume)
            .unwrap_or(0.0)
    }

    /// Store tickers that belong to the universe. Returns how many were kept.
    pub fn apply(&self, tickers: Vec<Ticker24h>) -> usize {
        let mut kept = 0;
        for ticker in tickers {
            if self.symbols.contains(&ticker.symbol) {
                self.tickers.insert(ticker.symbol.clone(), ticker);
                kept += 1;
            }
        }
        kept
    }

    /// Fetch once. A failure keeps the previous values.
    pub async fn poll(&self, source: &dyn TickerSource) -> bool {
        match source.tickers_24h().await {
            Ok(tickers) => {
                let kept = self.apply(tickers);
                debug!("Ticker poll updated {} symbols", kept);
                true
            }
            Err(e) => {
                warn!("Ticker poll failed: {}", e);
                false
            }
        }
    }

    /// Poll every `every` until `stop_rx` turns true.
    pub async fn run(
        self: Arc<Self>,
        source: Arc<dyn TickerSource>,
        every: Duration,
        mut stop_rx: watch::Receiver<bool>,
    ) {
        info!("Ticker board polling every {:?}", every);
        loop {
            self.poll(source.as_ref()).await;
            if wait_or_stop(&mut stop_rx, every).await {
                break;
            }
        }
        info!("Ticker board stopped");
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }
}
