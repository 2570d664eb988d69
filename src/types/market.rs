use serde::{Deserialize, Serialize};

/// One OHLC candle from the exchange's kline endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candle {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    /// Midpoint of the candle's range.
    pub fn hl2(&self) -> f64 {
        (self.high + self.low) / 2.0
    }
}

/// 24-hour rolling statistics for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker24h {
    pub symbol: String,
    pub last_price: f64,
    pub change_pct_24h: f64,
    pub quote_volume: f64,
}
