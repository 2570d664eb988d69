use crate::error::{AppError, Result};
use crate::sources::{KlineSource, TickerSource};
use crate::types::{Candle, Ticker24h};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

const REQUEST_TIMEOUT_SECS: u64 = 8;

/// Binance futures 24hr ticker response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceTicker {
    symbol: String,
    last_price: String,
    price_change_percent: String,
    #[serde(default)]
    quote_volume: String,
}

impl BinanceTicker {
    fn into_ticker(self) -> Option<Ticker24h> {
        let last_price: f64 = self.last_price.parse().ok()?;
        let change_pct_24h: f64 = self.price_change_percent.parse().ok()?;
        let quote_volume: f64 = self.quote_volume.parse().unwrap_or(0.0);
        Some(Ticker24h {
            symbol: self.symbol,
            last_price,
            change_pct_24h,
            quote_volume,
        })
    }
}

/// Parse one kline row: `[openTime, "open", "high", "low", "close", ...]`.
fn parse_kline_row(row: &Value) -> Option<Candle> {
    let row = row.as_array()?;
    if row.len() < 5 {
        return None;
    }
    let price = |idx: usize| -> Option<f64> {
        match &row[idx] {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    };
    Some(Candle {
        open_time: row[0].as_i64()?,
        open: price(1)?,
        high: price(2)?,
        low: price(3)?,
        close: price(4)?,
    })
}

/// Binance USDT-M futures REST client.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
}

impl BinanceClient {
    /// Create a new Binance client against a REST base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .user_agent("trendgrid/0.1")
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        let response = self.client.get(url).query(query).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!(
                "Binance API returned {}: {}",
                status,
                text.chars().take(200).collect::<String>()
            );
            return Err(AppError::ExternalApi(format!("Binance API error: {}", status)));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl TickerSource for BinanceClient {
    async fn tickers_24h(&self) -> Result<Vec<Ticker24h>> {
        let url = format!("{}/ticker/24hr", self.base_url);
        let body = self.get_json(&url, &[]).await?;
        let raw: Vec<BinanceTicker> = serde_json::from_value(body)?;
        Ok(raw.into_iter().filter_map(BinanceTicker::into_ticker).collect())
    }
}

#[async_trait]
impl KlineSource for BinanceClient {
    async fn klines(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<Candle>> {
        let url = format!("{}/klines", self.base_url);
        let body = self
            .get_json(
                &url,
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", interval.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        let rows = body.as_array().ok_or_else(|| {
            AppError::ExternalApi(format!("klines for {} {} is not an array", symbol, interval))
        })?;

        let candles: Vec<Candle> = rows.iter().filter_map(parse_kline_row).collect();
        if candles.len() < rows.len() {
            debug!(
                "Skipped {} malformed kline rows for {} {}",
                rows.len() - candles.len(),
                symbol,
                interval
            );
        }
        Ok(candles)
    }
}
