// src/domain/mod.rs
pub mod errors;
pub mod models;

// Re-export common types for convenience
pub use errors::{
    AnalysisError, AnalysisResult, AppError, AppResult, ExchangeError, ExchangeResult, TradingError,
    TradingResult,
};
pub use models::{
    Candle, CloseIntent, Direction, ExitReason, OpenIntent, OrderSide, PositionSide, Signal, Timeframe,
    TrendBias,
};
