// src/domain/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::ExchangeError;

/// One OHLCV bar. Candles arrive as ordered sequences per instrument and
/// timeframe and are never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(open_time: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            open_time,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

pub fn close_prices(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

/// Kline intervals understood by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Timeframe {
    Minutes1,
    Minutes3,
    Minutes5,
    Minutes15,
    Minutes30,
    Hours1,
    Hours2,
    Hours4,
    Hours6,
    Hours8,
    Hours12,
    Days1,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Minutes1 => "1m",
            Timeframe::Minutes3 => "3m",
            Timeframe::Minutes5 => "5m",
            Timeframe::Minutes15 => "15m",
            Timeframe::Minutes30 => "30m",
            Timeframe::Hours1 => "1h",
            Timeframe::Hours2 => "2h",
            Timeframe::Hours4 => "4h",
            Timeframe::Hours6 => "6h",
            Timeframe::Hours8 => "8h",
            Timeframe::Hours12 => "12h",
            Timeframe::Days1 => "1d",
        }
    }
}

impl FromStr for Timeframe {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1m" => Ok(Timeframe::Minutes1),
            "3m" => Ok(Timeframe::Minutes3),
            "5m" => Ok(Timeframe::Minutes5),
            "15m" => Ok(Timeframe::Minutes15),
            "30m" => Ok(Timeframe::Minutes30),
            "1h" => Ok(Timeframe::Hours1),
            "2h" => Ok(Timeframe::Hours2),
            "4h" => Ok(Timeframe::Hours4),
            "6h" => Ok(Timeframe::Hours6),
            "8h" => Ok(Timeframe::Hours8),
            "12h" => Ok(Timeframe::Hours12),
            "1d" => Ok(Timeframe::Days1),
            other => Err(ExchangeError::InvalidInterval(other.to_string())),
        }
    }
}

impl TryFrom<String> for Timeframe {
    type Error = ExchangeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> Self {
        tf.as_str().to_string()
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Directional bias of the higher timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendBias {
    Bullish,
    Bearish,
    Neutral,
}

impl fmt::Display for TrendBias {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TrendBias::Bullish => write!(f, "BULLISH"),
            TrendBias::Bearish => write!(f, "BEARISH"),
            TrendBias::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Long,
    Short,
    None,
}

impl Direction {
    /// The position side this direction opens, if any.
    pub fn side(&self) -> Option<PositionSide> {
        match self {
            Direction::Long => Some(PositionSide::Long),
            Direction::Short => Some(PositionSide::Short),
            Direction::None => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
            Direction::None => write!(f, "NONE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// Order side that opens a position on this side.
    pub fn entry_order_side(&self) -> OrderSide {
        match self {
            PositionSide::Long => OrderSide::Buy,
            PositionSide::Short => OrderSide::Sell,
        }
    }

    /// Order side that flattens a position on this side.
    pub fn exit_order_side(&self) -> OrderSide {
        match self {
            PositionSide::Long => OrderSide::Sell,
            PositionSide::Short => OrderSide::Buy,
        }
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PositionSide::Long => write!(f, "LONG"),
            PositionSide::Short => write!(f, "SHORT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

/// Entry decision for one instrument within one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub instrument: String,
    pub direction: Direction,
    pub reference_price: f64,
    pub stop_price: f64,
    pub timestamp: DateTime<Utc>,
    pub confidence: f64,
}

impl Signal {
    pub fn none(instrument: &str, reference_price: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            instrument: instrument.to_string(),
            direction: Direction::None,
            reference_price,
            stop_price: reference_price,
            timestamp,
            confidence: 0.0,
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.direction != Direction::None
    }
}

/// Request handed to the order sink when a position is admitted.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenIntent {
    pub instrument: String,
    pub side: PositionSide,
    pub quantity: f64,
    pub stop_price: f64,
    pub take_profit_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    TrailingStop,
    TakeProfit,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "STOP_LOSS"),
            ExitReason::TrailingStop => write!(f, "TRAILING_STOP"),
            ExitReason::TakeProfit => write!(f, "TAKE_PROFIT"),
        }
    }
}

/// Request handed to the order sink when a position leaves the open set.
#[derive(Debug, Clone, PartialEq)]
pub struct CloseIntent {
    pub instrument: String,
    pub side: PositionSide,
    pub quantity: f64,
    pub reason: ExitReason,
}
