//! Supertrend indicator.

use super::TrendIndicator;
use crate::config::{BandSource, SupertrendConfig};
use crate::error::{AppError, Result};
use crate::types::{Candle, Signal};

/// Supertrend indicator.
///
/// ATR-wide bands are placed around the source price (hl2 or close):
/// - Lower band only ratchets up while price stays above it
/// - Upper band only ratchets down while price stays below it
///
/// The trend turns up when a close breaks the previous upper band and down
/// when a close breaks the previous lower band. It is never neutral.
///
/// Carry-over is conditional and must stay that way: a band the previous
/// close has crossed restarts from the fresh value instead of being clamped
/// to its old level.
pub struct Supertrend {
    config: SupertrendConfig,
}

impl Default for Supertrend {
    fn default() -> Self {
        Self::new(SupertrendConfig::default())
    }
}

impl Supertrend {
    pub fn new(config: SupertrendConfig) -> Self {
        Self { config }
    }

    /// Calculate True Range.
    fn true_range(current: &Candle, previous: Option<&Candle>) -> f64 {
        let hl = current.high - current.low;
        match previous {
            Some(prev) => {
                let hc = (current.high - prev.close).abs();
                let lc = (current.low - prev.close).abs();
                hl.max(hc).max(lc)
            }
            None => hl,
        }
    }

    fn source(&self, candle: &Candle) -> f64 {
        match self.config.source {
            BandSource::Hl2 => candle.hl2(),
            BandSource::Close => candle.close,
        }
    }
}

impl TrendIndicator for Supertrend {
    fn name(&self) -> &str {
        "Supertrend"
    }

    fn min_periods(&self) -> usize {
        self.config.atr_period + 2
    }

    fn kline_limit(&self) -> usize {
        (self.config.atr_period * 3).max(60)
    }

    fn classify(&self, candles: &[Candle]) -> Result<Signal> {
        if candles.len() < self.min_periods() {
            return Err(AppError::InsufficientData {
                needed: self.min_periods(),
                got: candles.len(),
            });
        }

        let period = self.config.atr_period;
        let multiplier = self.config.multiplier;

        let true_ranges: Vec<f64> = candles
            .iter()
            .enumerate()
            .map(|(i, c)| Self::true_range(c, i.checked_sub(1).map(|p| &candles[p])))
            .collect();

        // Wilder's smoothing, seeded with the SMA of the first `period` ranges
        let mut atr = true_ranges[..period].iter().sum::<f64>() / period as f64;

        let seed = &candles[period - 1];
        let mut lower = self.source(seed) - multiplier * atr;
        let mut upper = self.source(seed) + multiplier * atr;
        let mut trend = if seed.close > lower {
            Signal::Up
        } else {
            Signal::Down
        };

        for i in period..candles.len() {
            atr += (true_ranges[i] - atr) / period as f64;

            let src = self.source(&candles[i]);
            let prev_close = candles[i - 1].close;
            let (prev_lower, prev_upper) = (lower, upper);

            let basic_lower = src - multiplier * atr;
            let basic_upper = src + multiplier * atr;
            lower = if prev_close > prev_lower {
                basic_lower.max(prev_lower)
            } else {
                basic_lower
            };
            upper = if prev_close < prev_upper {
                basic_upper.min(prev_upper)
            } else {
                basic_upper
            };

            let close = candles[i].close;
            trend = match trend {
                Signal::Down if close > prev_upper => Signal::Up,
                Signal::Up if close < prev_lower => Signal::Down,
                current => current,
            };
        }

        Ok(trend)
    }
}
