// src/analysis/indicators.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::{AnalysisError, AnalysisResult};
use crate::domain::models::{close_prices, Candle};

/// Periods of every indicator computed for a timeframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSettings {
    pub ema_fast_period: usize,
    pub ema_slow_period: usize,
    pub rsi_period: usize,
    pub macd_fast_period: usize,
    pub macd_slow_period: usize,
    pub macd_signal_period: usize,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            ema_fast_period: 20,
            ema_slow_period: 200,
            rsi_period: 14,
            macd_fast_period: 12,
            macd_slow_period: 26,
            macd_signal_period: 9,
        }
    }
}

impl IndicatorSettings {
    /// Candles needed before every series has a value on the latest bar.
    pub fn lookback(&self) -> usize {
        self.requirements()
            .iter()
            .map(|(_, required)| *required)
            .max()
            .unwrap_or(0)
    }

    fn requirements(&self) -> [(&'static str, usize); 4] {
        [
            ("EMA slow", self.ema_slow_period),
            ("EMA fast", self.ema_fast_period),
            ("RSI", self.rsi_period + 1),
            ("MACD", self.macd_slow_period + self.macd_signal_period.saturating_sub(1)),
        ]
    }

    pub fn validate(&self) -> AnalysisResult<()> {
        let periods = [
            ("ema_fast_period", self.ema_fast_period),
            ("ema_slow_period", self.ema_slow_period),
            ("rsi_period", self.rsi_period),
            ("macd_fast_period", self.macd_fast_period),
            ("macd_slow_period", self.macd_slow_period),
            ("macd_signal_period", self.macd_signal_period),
        ];
        for (name, period) in periods {
            if period == 0 {
                return Err(AnalysisError::InvalidPeriod(format!("{} must be positive", name)));
            }
        }
        if self.macd_fast_period >= self.macd_slow_period {
            return Err(AnalysisError::InvalidPeriod(format!(
                "MACD fast period ({}) must be below slow period ({})",
                self.macd_fast_period, self.macd_slow_period
            )));
        }
        Ok(())
    }
}

/// Exponential Moving Average (EMA), seeded with the SMA of the first window
/// and aligned with the input.
pub fn calculate_ema(prices: &[f64], period: usize) -> AnalysisResult<Vec<Option<f64>>> {
    check_period(period)?;
    if prices.len() < period {
        return Err(insufficient("EMA", period, prices.len()));
    }

    let multiplier = 2.0 / (period + 1) as f64;
    let mut result = vec![None; prices.len()];

    let mut previous = prices.iter().take(period).sum::<f64>() / period as f64;
    result[period - 1] = Some(previous);

    for i in period..prices.len() {
        previous = (prices[i] - previous) * multiplier + previous;
        result[i] = Some(previous);
    }

    Ok(result)
}

/// Relative Strength Index (RSI) with Wilder's smoothing, aligned with the input.
pub fn calculate_rsi(prices: &[f64], period: usize) -> AnalysisResult<Vec<Option<f64>>> {
    check_period(period)?;
    if prices.len() <= period {
        return Err(insufficient("RSI", period + 1, prices.len()));
    }

    let mut result = vec![None; prices.len()];
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for i in 1..=period {
        let change = prices[i] - prices[i - 1];
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss -= change;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    result[period] = Some(rsi_from_averages(avg_gain, avg_loss));

    let smoothing = (period - 1) as f64;
    for i in (period + 1)..prices.len() {
        let change = prices[i] - prices[i - 1];
        let (gain, loss) = if change > 0.0 { (change, 0.0) } else { (0.0, -change) };
        avg_gain = (avg_gain * smoothing + gain) / period as f64;
        avg_loss = (avg_loss * smoothing + loss) / period as f64;
        result[i] = Some(rsi_from_averages(avg_gain, avg_loss));
    }

    Ok(result)
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        // flat window reads as neutral, pure gains as fully overbought
        return if avg_gain == 0.0 { 50.0 } else { 100.0 };
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

/// MACD line, signal line and histogram, aligned with the input.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub line: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
    pub histogram: Vec<Option<f64>>,
}

/// Moving Average Convergence Divergence (MACD)
pub fn calculate_macd(
    prices: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> AnalysisResult<MacdSeries> {
    check_period(signal_period)?;
    let required = slow_period + signal_period - 1;
    if prices.len() < required {
        return Err(insufficient("MACD", required, prices.len()));
    }

    let fast_ema = calculate_ema(prices, fast_period)?;
    let slow_ema = calculate_ema(prices, slow_period)?;

    let line: Vec<Option<f64>> = fast_ema
        .iter()
        .zip(slow_ema.iter())
        .map(|(fast, slow)| match (fast, slow) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    let signal = ema_of_defined(&line, signal_period)?;

    let histogram = line
        .iter()
        .zip(signal.iter())
        .map(|(l, s)| match (l, s) {
            (Some(l), Some(s)) => Some(l - s),
            _ => None,
        })
        .collect();

    Ok(MacdSeries { line, signal, histogram })
}

/// EMA over the defined tail of a warm-up padded series, re-aligned to it.
fn ema_of_defined(series: &[Option<f64>], period: usize) -> AnalysisResult<Vec<Option<f64>>> {
    let start = series.iter().position(Option::is_some).unwrap_or(series.len());
    let tail: Vec<f64> = series[start..].iter().map(|v| v.unwrap_or_default()).collect();

    let mut result = vec![None; series.len()];
    if tail.len() < period {
        return Ok(result);
    }
    for (offset, value) in calculate_ema(&tail, period)?.into_iter().enumerate() {
        result[start + offset] = value;
    }
    Ok(result)
}

fn check_period(period: usize) -> AnalysisResult<()> {
    if period == 0 {
        return Err(AnalysisError::InvalidPeriod("period must be positive".to_string()));
    }
    Ok(())
}

fn insufficient(indicator: &'static str, required: usize, actual: usize) -> AnalysisError {
    AnalysisError::InsufficientData {
        indicator,
        required,
        actual,
    }
}

/// Indicator values of a single bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorPoint {
    pub open_time: DateTime<Utc>,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
}

/// Every indicator series of one candle sequence, index-aligned with the candles.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub candles: Vec<Candle>,
    pub ema_fast: Vec<Option<f64>>,
    pub ema_slow: Vec<Option<f64>>,
    pub rsi: Vec<Option<f64>>,
    pub macd_line: Vec<Option<f64>>,
    pub macd_signal: Vec<Option<f64>>,
    pub macd_histogram: Vec<Option<f64>>,
}

impl IndicatorSnapshot {
    /// Computes all indicators from scratch. Fails without a partial result
    /// when the sequence is shorter than the longest lookback.
    pub fn compute(candles: &[Candle], settings: &IndicatorSettings) -> AnalysisResult<Self> {
        settings.validate()?;

        if let Some((indicator, required)) = settings
            .requirements()
            .into_iter()
            .filter(|(_, required)| candles.len() < *required)
            .max_by_key(|(_, required)| *required)
        {
            return Err(insufficient(indicator, required, candles.len()));
        }

        let closes = close_prices(candles);
        let ema_fast = calculate_ema(&closes, settings.ema_fast_period)?;
        let ema_slow = calculate_ema(&closes, settings.ema_slow_period)?;
        let rsi = calculate_rsi(&closes, settings.rsi_period)?;
        let macd = calculate_macd(
            &closes,
            settings.macd_fast_period,
            settings.macd_slow_period,
            settings.macd_signal_period,
        )?;

        Ok(Self {
            candles: candles.to_vec(),
            ema_fast,
            ema_slow,
            rsi,
            macd_line: macd.line,
            macd_signal: macd.signal,
            macd_histogram: macd.histogram,
        })
    }

    fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn point(&self, index: usize) -> Option<IndicatorPoint> {
        let candle = self.candles.get(index)?;
        let at = |series: &Vec<Option<f64>>| series.get(index).copied().flatten();
        Some(IndicatorPoint {
            open_time: candle.open_time,
            close: candle.close,
            high: candle.high,
            low: candle.low,
            ema_fast: at(&self.ema_fast),
            ema_slow: at(&self.ema_slow),
            rsi: at(&self.rsi),
            macd: at(&self.macd_line),
            macd_signal: at(&self.macd_signal),
            macd_histogram: at(&self.macd_histogram),
        })
    }

    pub fn latest(&self) -> Option<IndicatorPoint> {
        self.len().checked_sub(1).and_then(|i| self.point(i))
    }

    pub fn previous(&self) -> Option<IndicatorPoint> {
        self.len().checked_sub(2).and_then(|i| self.point(i))
    }

    pub fn latest_close(&self) -> Option<f64> {
        self.candles.last().map(|c| c.close)
    }
}
