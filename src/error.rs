use thiserror::Error;

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Insufficient data: need {needed} points, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("Division by zero: previous close is 0")]
    DivisionByZero,

    #[error("Unknown timeframe: {0}")]
    UnknownTimeframe(String),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Whether the error is a transient data problem that the next poll may fix.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::ExternalApi(_)
                | AppError::InsufficientData { .. }
                | AppError::DivisionByZero
                | AppError::Reqwest(_)
                | AppError::SerdeJson(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
