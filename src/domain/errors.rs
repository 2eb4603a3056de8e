// src/domain/errors.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Trading error: {0}")]
    Trading(#[from] TradingError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures of the exchange collaborators. None of these are fatal to the bot;
/// the orchestrator skips the affected instrument for the current cycle.
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Order error: {0}")]
    Order(String),

    #[error("Response parse error: {0}")]
    Parse(String),

    #[error("Invalid interval: {0}")]
    InvalidInterval(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Insufficient data for {indicator}: need at least {required} candles, got {actual}")]
    InsufficientData {
        indicator: &'static str,
        required: usize,
        actual: usize,
    },

    #[error("Invalid indicator period: {0}")]
    InvalidPeriod(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TradingError {
    #[error("Degenerate stop: distance {distance} is below tolerance {tolerance}")]
    DegenerateStop { distance: f64, tolerance: f64 },

    #[error("Invalid stop: {0}")]
    InvalidStop(String),

    #[error("Invalid trade parameters: {0}")]
    InvalidTrade(String),

    #[error("No actionable direction for {0}")]
    NoDirection(String),
}

pub type AppResult<T> = Result<T, AppError>;
pub type ExchangeResult<T> = Result<T, ExchangeError>;
pub type TradingResult<T> = Result<T, TradingError>;
pub type AnalysisResult<T> = Result<T, AnalysisError>;
