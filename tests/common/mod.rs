// tests/common/mod.rs
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};

use auto_futures::config::Config;
use auto_futures::domain::errors::{ExchangeError, ExchangeResult};
use auto_futures::domain::models::{Candle, Timeframe};
use auto_futures::exchange::client::{AccountSource, MarketDataSource};

/// Noisy 15m rise whose last bar closes back above EMA20 after a dip, with
/// RSI in the 50-70 band and MACD above a positive signal line.
pub fn entry_candles() -> Vec<Candle> {
    let closes: Vec<f64> = (0..209)
        .map(|t| {
            let noise = if t % 2 == 0 { 1.0 } else { -1.0 };
            let mut close = 100.0 + 0.02 * t as f64 + noise;
            if t % 7 == 6 {
                close -= 4.0;
            }
            close
        })
        .collect();
    candles(&closes, Duration::minutes(15))
}

/// Steady 4h rise, always above its EMA200.
pub fn rising_trend_candles() -> Vec<Candle> {
    let closes: Vec<f64> = (0..250).map(|t| 100.0 + 0.5 * t as f64).collect();
    candles(&closes, Duration::hours(4))
}

pub fn falling_trend_candles() -> Vec<Candle> {
    let closes: Vec<f64> = (0..250).map(|t| 300.0 - 0.5 * t as f64).collect();
    candles(&closes, Duration::hours(4))
}

/// Candles with open at the previous close and a one-unit high/low range.
pub fn candles(closes: &[f64], step: Duration) -> Vec<Candle> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle::new(
                start + step * i as i32,
                open,
                open.max(close) + 0.5,
                open.min(close) - 0.5,
                close,
                10.0,
            )
        })
        .collect()
}

pub fn test_config(symbols: &[&str]) -> Config {
    let mut config = Config::default();
    config.trading.symbols = symbols.iter().map(|s| s.to_string()).collect();
    config.trading.positions_file = String::new();
    config.trading.candle_count = 250;
    config
}

/// In-memory market: fixed candles per timeframe, adjustable prices, and
/// instruments that always fail.
#[derive(Default)]
pub struct MockMarket {
    pub candles: HashMap<Timeframe, Vec<Candle>>,
    pub prices: Mutex<HashMap<String, f64>>,
    pub failing: Vec<String>,
}

impl MockMarket {
    pub fn new(trend: Vec<Candle>, entry: Vec<Candle>) -> Self {
        let mut candles = HashMap::new();
        candles.insert(Timeframe::Hours4, trend);
        candles.insert(Timeframe::Minutes15, entry);
        Self {
            candles,
            ..Self::default()
        }
    }

    pub fn failing(mut self, instrument: &str) -> Self {
        self.failing.push(instrument.to_string());
        self
    }

    pub fn set_price(&self, instrument: &str, price: f64) {
        self.prices.lock().unwrap().insert(instrument.to_string(), price);
    }
}

#[async_trait]
impl MarketDataSource for MockMarket {
    async fn get_candles(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> ExchangeResult<Vec<Candle>> {
        if self.failing.iter().any(|f| f == instrument) {
            return Err(ExchangeError::DataUnavailable(format!("no klines for {}", instrument)));
        }
        let series = self
            .candles
            .get(&timeframe)
            .ok_or_else(|| ExchangeError::DataUnavailable(format!("no {} series", timeframe)))?;
        let skip = series.len().saturating_sub(count);
        Ok(series[skip..].to_vec())
    }

    async fn get_price(&self, instrument: &str) -> ExchangeResult<f64> {
        self.prices
            .lock()
            .unwrap()
            .get(instrument)
            .copied()
            .ok_or_else(|| ExchangeError::DataUnavailable(format!("no price for {}", instrument)))
    }
}

/// Fixed equity that counts how often it was asked.
pub struct CountingEquity {
    pub equity: f64,
    pub calls: AtomicUsize,
}

impl CountingEquity {
    pub fn new(equity: f64) -> Self {
        Self {
            equity,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountSource for CountingEquity {
    async fn get_equity(&self) -> ExchangeResult<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.equity)
    }
}

/// Account source that is always down.
pub struct FailingEquity;

#[async_trait]
impl AccountSource for FailingEquity {
    async fn get_equity(&self) -> ExchangeResult<f64> {
        Err(ExchangeError::DataUnavailable("account endpoint down".to_string()))
    }
}
