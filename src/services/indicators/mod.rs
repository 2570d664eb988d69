//! Trend indicators that classify a candle series as up, down or neutral.

pub mod bollinger;
pub mod supertrend;

pub use bollinger::BollingerTrend;
pub use supertrend::Supertrend;

use crate::error::Result;
use crate::types::{Candle, Signal};

/// Trait for indicators that reduce a candle series to a trend signal.
pub trait TrendIndicator: Send + Sync {
    /// Human-readable name.
    fn name(&self) -> &str;

    /// Minimum number of candles required for classification.
    fn min_periods(&self) -> usize;

    /// How many candles to request from the exchange.
    fn kline_limit(&self) -> usize {
        self.min_periods()
    }

    /// Classify the series (oldest first).
    /// Returns `InsufficientData` when fewer than `min_periods` candles are given.
    fn classify(&self, candles: &[Candle]) -> Result<Signal>;
}
