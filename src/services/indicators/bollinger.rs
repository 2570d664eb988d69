//! Bollinger Bands trend classification.

use super::TrendIndicator;
use crate::config::BollingerSettings;
use crate::error::{AppError, Result};
use crate::types::{Candle, Signal};

/// Bollinger Bands used as a trend filter.
///
/// - Middle band: SMA(period)
/// - Upper/lower band: SMA +/- stddev * population StdDev
///
/// A close outside a band is a breakout in that direction; inside the bands
/// the side of the middle band decides. A close exactly on the middle band
/// is neutral.
pub struct BollingerTrend {
    settings: BollingerSettings,
}

impl Default for BollingerTrend {
    fn default() -> Self {
        Self::new(BollingerSettings::default())
    }
}

impl BollingerTrend {
    pub fn new(settings: BollingerSettings) -> Self {
        Self { settings }
    }

    /// Calculate standard deviation.
    fn std_dev(values: &[f64], mean: f64) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        let variance: f64 =
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
        variance.sqrt()
    }
}

impl TrendIndicator for BollingerTrend {
    fn name(&self) -> &str {
        "Bollinger Bands"
    }

    fn min_periods(&self) -> usize {
        self.settings.period
    }

    fn kline_limit(&self) -> usize {
        self.settings.period + 1
    }

    fn classify(&self, candles: &[Candle]) -> Result<Signal> {
        let period = self.settings.period;
        if candles.len() < period {
            return Err(AppError::InsufficientData {
                needed: period,
                got: candles.len(),
            });
        }

        let closes: Vec<f64> = candles[candles.len() - period..]
            .iter()
            .map(|c| c.close)
            .collect();

        let middle = closes.iter().sum::<f64>() / period as f64;
        let width = self.settings.stddev * Self::std_dev(&closes, middle);
        let upper = middle + width;
        let lower = middle - width;

        let last = closes[closes.len() - 1];
        let signal = if last > upper || last > middle {
            Signal::Up
        } else if last < lower || last < middle {
            Signal::Down
        } else {
            Signal::Neutral
        };

        Ok(signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                open_time: i as i64,
                open: close,
                high: close,
                low: close,
                close,
            })
            .collect()
    }

    fn small() -> BollingerTrend {
        BollingerTrend::new(BollingerSettings {
            period: 5,
            stddev: 2.0,
        })
    }

    #[test]
    fn test_breakout_above_upper_band() {
        let candles = series(&[10.0, 10.0, 10.0, 10.0, 20.0]);
        assert_eq!(small().classify(&candles).unwrap(), Signal::Up);
    }

    #[test]
    fn test_below_middle_band() {
        let candles = series(&[10.0, 11.0, 12.0, 11.0, 10.5]);
        assert_eq!(small().classify(&candles).unwrap(), Signal::Down);
    }

    #[test]
    fn test_flat_series_is_neutral() {
        let candles = series(&[10.0; 5]);
        assert_eq!(small().classify(&candles).unwrap(), Signal::Neutral);
    }

    #[test]
    fn test_uses_latest_window_only() {
        let candles = series(&[1000.0, 10.0, 10.0, 10.0, 10.0, 11.0]);
        assert_eq!(small().classify(&candles).unwrap(), Signal::Up);
    }

    #[test]
    fn test_insufficient_data() {
        let candles = series(&[10.0, 11.0]);
        assert!(matches!(
            small().classify(&candles),
            Err(AppError::InsufficientData { needed: 5, got: 2 })
        ));
    }

    #[test]
    fn test_kline_limit_is_period_plus_one() {
        assert_eq!(BollingerTrend::default().kline_limit(), 21);
    }
}
