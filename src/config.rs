use crate::error::{AppError, Result};
use crate::types::{Timeframe, TimeframeState, TimeframeStates};
use std::collections::{HashMap, HashSet};
use std::env;
use std::time::Duration;

/// Default USDT-M perpetual universe.
pub const DEFAULT_SYMBOLS: &[&str] = &[
    "BTCUSDT", "ETHUSDT", "BNBUSDT", "SOLUSDT", "XRPUSDT", "DOGEUSDT", "ADAUSDT", "AVAXUSDT",
    "DOTUSDT", "LINKUSDT", "TRXUSDT", "LTCUSDT", "ATOMUSDT", "UNIUSDT", "XLMUSDT", "BCHUSDT",
    "NEARUSDT", "APTUSDT", "ARBUSDT", "OPUSDT",
];

/// Default timeframe label -> exchange interval mapping, smallest first.
pub const DEFAULT_TIMEFRAMES: &[(&str, &str)] = &[
    ("M5", "5m"),
    ("M15", "15m"),
    ("H1", "1h"),
    ("H4", "4h"),
    ("H6", "6h"),
    ("D1", "1d"),
    ("W1", "1w"),
    ("1M", "1M"),
];

/// Which indicator backs the signal function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndicatorKind {
    #[default]
    Supertrend,
    Bollinger,
}

impl IndicatorKind {
    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "supertrend" | "st" => Some(Self::Supertrend),
            "bollinger" | "bb" => Some(Self::Bollinger),
            _ => None,
        }
    }
}

/// Price series the Supertrend bands are built around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BandSource {
    #[default]
    Hl2,
    Close,
}

/// Supertrend parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupertrendConfig {
    /// ATR smoothing period.
    pub atr_period: usize,
    /// Band width in ATRs.
    pub multiplier: f64,
    pub source: BandSource,
}

impl Default for SupertrendConfig {
    fn default() -> Self {
        Self {
            atr_period: 10,
            multiplier: 3.0,
            source: BandSource::Hl2,
        }
    }
}

/// Bollinger band parameters for one timeframe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerSettings {
    pub period: usize,
    pub stddev: f64,
}

impl Default for BollingerSettings {
    fn default() -> Self {
        Self {
            period: 20,
            stddev: 2.0,
        }
    }
}

impl BollingerSettings {
    /// Parse `period/stddev`, e.g. `20/2.0`.
    pub fn parse(s: &str) -> Option<Self> {
        let (period, stddev) = s.trim().split_once('/')?;
        let period: usize = period.trim().parse().ok()?;
        let stddev: f64 = stddev.trim().parse().ok()?;
        (period > 1 && stddev > 0.0).then_some(Self { period, stddev })
    }
}

/// Wall-clock pause between sweeps, keyed by exchange interval code.
///
/// Fast candles are re-polled often; slow candles tolerate staleness, which
/// keeps many timeframes x many symbols under the exchange's rate limits.
#[derive(Debug, Clone)]
pub struct RefreshSchedule {
    intervals: HashMap<String, Duration>,
    fallback: Duration,
}

impl Default for RefreshSchedule {
    fn default() -> Self {
        let table: &[(&str, u64)] = &[
            ("1m", 2),
            ("3m", 2),
            ("5m", 10),
            ("15m", 10),
            ("1h", 10),
            ("4h", 10),
            ("6h", 10),
            ("1d", 20),
            ("1w", 20),
            ("1M", 20),
        ];
        Self {
            intervals: table
                .iter()
                .map(|(code, secs)| (code.to_string(), Duration::from_secs(*secs)))
                .collect(),
            fallback: Duration::from_secs(5),
        }
    }
}

impl RefreshSchedule {
    /// Same pause for every interval. Mostly useful in tests.
    pub fn uniform(every: Duration) -> Self {
        Self {
            intervals: HashMap::new(),
            fallback: every,
        }
    }

    pub fn with_interval(mut self, code: impl Into<String>, every: Duration) -> Self {
        self.intervals.insert(code.into(), every);
        self
    }

    pub fn for_interval(&self, code: &str) -> Duration {
        self.intervals.get(code).copied().unwrap_or(self.fallback)
    }
}

/// Percent-change cache lifetime, keyed by exchange interval code.
#[derive(Debug, Clone)]
pub struct TtlTable {
    ttls: HashMap<String, Duration>,
    fallback: Duration,
}

impl Default for TtlTable {
    fn default() -> Self {
        let table: &[(&str, u64)] = &[
            ("5m", 60),
            ("15m", 120),
            ("1h", 300),
            ("4h", 600),
            ("6h", 900),
            ("1d", 1800),
            ("1w", 3600),
            ("1M", 3600),
        ];
        Self {
            ttls: table
                .iter()
                .map(|(code, secs)| (code.to_string(), Duration::from_secs(*secs)))
                .collect(),
            fallback: Duration::from_secs(300),
        }
    }
}

impl TtlTable {
    /// Same TTL for every interval.
    pub fn uniform(ttl: Duration) -> Self {
        Self {
            ttls: HashMap::new(),
            fallback: ttl,
        }
    }

    pub fn with_ttl(mut self, code: impl Into<String>, ttl: Duration) -> Self {
        self.ttls.insert(code.into(), ttl);
        self
    }

    pub fn ttl_for(&self, code: &str) -> Duration {
        self.ttls.get(code).copied().unwrap_or(self.fallback)
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Binance USDT-M futures REST base URL.
    pub binance_url: String,
    /// Fixed symbol universe, in display order.
    pub symbols: Vec<String>,
    /// Fixed timeframe list, smallest first. Position doubles as rank.
    pub timeframes: Vec<Timeframe>,
    /// Filter state applied at start-up.
    pub initial_states: TimeframeStates,
    pub indicator: IndicatorKind,
    pub supertrend: SupertrendConfig,
    /// Bollinger settings used when a timeframe has no override.
    pub bollinger: BollingerSettings,
    /// Per-timeframe Bollinger overrides keyed by label.
    pub bollinger_overrides: HashMap<String, BollingerSettings>,
    pub refresh: RefreshSchedule,
    pub ttl: TtlTable,
    /// Max concurrent percent-change fetches.
    pub prefetch_pool_size: usize,
    /// Delay between starting consecutive timeframe workers.
    pub worker_start_stagger: Duration,
    /// Combination evaluation period.
    pub combination_refresh: Duration,
    /// Extra evaluation after a prefetch was submitted.
    pub prefetch_redraw_delay: Duration,
    /// 24h ticker polling period.
    pub ticker_poll_interval: Duration,
    /// Timeframe consulted for top/dip reversal hints.
    pub reversal_pivot: String,
    /// Log-only mode without the terminal dashboard.
    pub headless: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        // Format: "BTCUSDT,ETHUSDT"
        let symbols: Vec<String> = env::var("TRENDGRID_SYMBOLS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|sym| sym.trim().to_uppercase())
                    .filter(|sym| !sym.is_empty())
                    .collect()
            })
            .filter(|v: &Vec<String>| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect());

        // Format: "M5:5m,H1:1h"
        let timeframes: Vec<Timeframe> = env::var("TRENDGRID_TIMEFRAMES")
            .ok()
            .map(|s| s.split(',').filter_map(Timeframe::parse).collect())
            .filter(|v: &Vec<Timeframe>| !v.is_empty())
            .unwrap_or_else(|| {
                DEFAULT_TIMEFRAMES
                    .iter()
                    .map(|(label, code)| Timeframe::new(*label, *code))
                    .collect()
            });

        // Format: "H1=green,D1=red"
        let initial_states: TimeframeStates = env::var("TRENDGRID_TF_STATES")
            .ok()
            .map(|s| {
                s.split(',')
                    .filter_map(|entry| {
                        let (label, state) = entry.split_once('=')?;
                        Some((label.trim().to_string(), TimeframeState::from_str(state.trim())?))
                    })
                    .collect()
            })
            .unwrap_or_default();

        // Format: "H1=20/2.0,D1=30/2.5"
        let bollinger_overrides = env::var("BOLLINGER_OVERRIDES")
            .ok()
            .map(|s| {
                s.split(',')
                    .filter_map(|entry| {
                        let (label, settings) = entry.split_once('=')?;
                        Some((label.trim().to_string(), BollingerSettings::parse(settings)?))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let defaults = SupertrendConfig::default();
        let bb_defaults = BollingerSettings::default();

        Self {
            binance_url: env::var("BINANCE_FAPI_URL")
                .unwrap_or_else(|_| "https://fapi.binance.com/fapi/v1".to_string()),
            symbols,
            timeframes,
            initial_states,
            indicator: env::var("TRENDGRID_INDICATOR")
                .ok()
                .and_then(|v| IndicatorKind::from_str(&v))
                .unwrap_or_default(),
            supertrend: SupertrendConfig {
                atr_period: env::var("SUPERTREND_ATR_PERIOD")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|p: &usize| *p > 0)
                    .unwrap_or(defaults.atr_period),
                multiplier: env::var("SUPERTREND_MULTIPLIER")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.multiplier),
                source: match env::var("SUPERTREND_SOURCE").ok().as_deref() {
                    Some("close") => BandSource::Close,
                    _ => BandSource::Hl2,
                },
            },
            bollinger: BollingerSettings {
                period: env::var("BOLLINGER_PERIOD")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|p: &usize| *p > 1)
                    .unwrap_or(bb_defaults.period),
                stddev: env::var("BOLLINGER_STDDEV")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(bb_defaults.stddev),
            },
            bollinger_overrides,
            refresh: RefreshSchedule::default(),
            ttl: TtlTable::default(),
            prefetch_pool_size: env::var("PREFETCH_POOL_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8),
            worker_start_stagger: Duration::from_millis(
                env::var("WORKER_START_STAGGER_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(200),
            ),
            combination_refresh: Duration::from_millis(
                env::var("COMBINATION_REFRESH_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5000),
            ),
            prefetch_redraw_delay: Duration::from_millis(
                env::var("PREFETCH_REDRAW_DELAY_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1200),
            ),
            ticker_poll_interval: Duration::from_secs(
                env::var("TICKER_POLL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
            ),
            reversal_pivot: env::var("REVERSAL_PIVOT_TIMEFRAME")
                .unwrap_or_else(|_| "H1".to_string()),
            headless: env::var("TRENDGRID_HEADLESS")
                .ok()
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }

    /// Reject configurations the workers cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.symbols.is_empty() {
            return Err(AppError::Config("symbol universe is empty".into()));
        }
        if self.timeframes.is_empty() {
            return Err(AppError::Config("no timeframes configured".into()));
        }
        if self.prefetch_pool_size == 0 {
            return Err(AppError::Config("PREFETCH_POOL_SIZE must be at least 1".into()));
        }
        if self.combination_refresh.is_zero() {
            return Err(AppError::Config("COMBINATION_REFRESH_MS must be positive".into()));
        }
        if self.ticker_poll_interval.is_zero() {
            return Err(AppError::Config("TICKER_POLL_SECS must be positive".into()));
        }

        let mut labels = HashSet::new();
        for tf in &self.timeframes {
            if !labels.insert(tf.label.as_str()) {
                return Err(AppError::Config(format!("duplicate timeframe label {}", tf.label)));
            }
        }
        for label in self.bollinger_overrides.keys() {
            if !labels.contains(label.as_str()) {
                return Err(AppError::UnknownTimeframe(label.clone()));
            }
        }

        Ok(())
    }

    /// Bollinger settings for a timeframe label.
    pub fn bollinger_for(&self, label: &str) -> BollingerSettings {
        self.bollinger_overrides
            .get(label)
            .copied()
            .unwrap_or(self.bollinger)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
