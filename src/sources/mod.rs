//! Exchange data sources and the signal-function seam.

pub mod binance;
pub mod indicator;

pub use binance::BinanceClient;
pub use indicator::IndicatorSignalSource;

use crate::error::Result;
use crate::types::{Candle, Signal, Ticker24h};
use async_trait::async_trait;

/// Recent candles for a symbol at an exchange interval, oldest first.
#[async_trait]
pub trait KlineSource: Send + Sync {
    async fn klines(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<Candle>>;
}

/// Trend classification for a symbol at one timeframe.
///
/// `interval` is the exchange interval code (`1h`), `timeframe` the label the
/// result is cached under (`H1`). An `Err` means "no update this round".
#[async_trait]
pub trait SignalSource: Send + Sync {
    async fn fetch_signal(&self, symbol: &str, interval: &str, timeframe: &str) -> Result<Signal>;
}

/// 24h rolling statistics for every listed symbol.
#[async_trait]
pub trait TickerSource: Send + Sync {
    async fn tickers_24h(&self) -> Result<Vec<Ticker24h>>;
}
