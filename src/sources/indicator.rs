use crate::config::{Config, IndicatorKind};
use crate::error::Result;
use crate::services::indicators::{BollingerTrend, Supertrend, TrendIndicator};
use crate::sources::{KlineSource, SignalSource};
use crate::types::Signal;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Signal function backed by a trend indicator over exchange klines.
pub struct IndicatorSignalSource {
    klines: Arc<dyn KlineSource>,
    default_indicator: Box<dyn TrendIndicator>,
    /// Per-timeframe indicators keyed by label.
    overrides: HashMap<String, Box<dyn TrendIndicator>>,
}

impl IndicatorSignalSource {
    pub fn new(klines: Arc<dyn KlineSource>, indicator: Box<dyn TrendIndicator>) -> Self {
        Self {
            klines,
            default_indicator: indicator,
            overrides: HashMap::new(),
        }
    }

    /// Use a different indicator for one timeframe label.
    pub fn with_override(mut self, label: impl Into<String>, indicator: Box<dyn TrendIndicator>) -> Self {
        self.overrides.insert(label.into(), indicator);
        self
    }

    /// Build the configured indicator, including per-timeframe Bollinger settings.
    pub fn from_config(klines: Arc<dyn KlineSource>, config: &Config) -> Self {
        match config.indicator {
            IndicatorKind::Supertrend => {
                Self::new(klines, Box::new(Supertrend::new(config.supertrend)))
            }
            IndicatorKind::Bollinger => config.bollinger_overrides.iter().fold(
                Self::new(klines, Box::new(BollingerTrend::new(config.bollinger))),
                |source, (label, settings)| {
                    source.with_override(label.clone(), Box::new(BollingerTrend::new(*settings)))
                },
            ),
        }
    }

    fn indicator_for(&self, timeframe: &str) -> &dyn TrendIndicator {
        self.overrides
            .get(timeframe)
            .map(|b| b.as_ref())
            .unwrap_or(self.default_indicator.as_ref())
    }
}

#[async_trait]
impl SignalSource for IndicatorSignalSource {
    async fn fetch_signal(&self, symbol: &str, interval: &str, timeframe: &str) -> Result<Signal> {
        let indicator = self.indicator_for(timeframe);
        let candles = self
            .klines
            .klines(symbol, interval, indicator.kline_limit())
            .await?;
        indicator.classify(&candles)
    }
}
