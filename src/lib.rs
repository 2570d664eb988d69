//! trendgrid - multi-timeframe trend signal dashboard for Binance USDT-M futures

pub mod config;
pub mod error;
pub mod services;
pub mod sources;
pub mod tui;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, Result};
pub use types::*;
