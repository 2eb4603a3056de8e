// src/analysis/trend.rs
use crate::analysis::indicators::IndicatorSnapshot;
use crate::domain::models::TrendBias;

/// Reduces the higher-timeframe snapshot to a directional bias by comparing
/// the latest close with the slow EMA.
pub fn classify_trend(snapshot: &IndicatorSnapshot) -> TrendBias {
    match (snapshot.latest_close(), snapshot.latest().and_then(|p| p.ema_slow)) {
        (Some(close), Some(ema_slow)) => classify(close, ema_slow),
        _ => TrendBias::Neutral,
    }
}

pub fn classify(close: f64, ema_slow: f64) -> TrendBias {
    if close > ema_slow {
        TrendBias::Bullish
    } else if close < ema_slow {
        TrendBias::Bearish
    } else {
        // exact equality, or NaN on either side
        TrendBias::Neutral
    }
}
