// src/trading/signals.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::indicators::{IndicatorPoint, IndicatorSnapshot};
use crate::domain::models::{Direction, Signal, TrendBias};

/// RSI band edges for entries. LONG entries need RSI in `[mid, overbought]`,
/// SHORT entries need RSI in `[oversold, mid]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalThresholds {
    pub rsi_oversold: f64,
    pub rsi_mid: f64,
    pub rsi_overbought: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            rsi_oversold: 30.0,
            rsi_mid: 50.0,
            rsi_overbought: 70.0,
        }
    }
}

/// Turns the entry-timeframe snapshot and the higher-timeframe bias into an
/// entry decision. Holds no state besides its thresholds and never sees open
/// positions.
#[derive(Debug, Clone, Default)]
pub struct SignalEvaluator {
    thresholds: SignalThresholds,
}

impl SignalEvaluator {
    pub fn new(thresholds: SignalThresholds) -> Self {
        Self { thresholds }
    }

    pub fn evaluate(
        &self,
        instrument: &str,
        snapshot: &IndicatorSnapshot,
        latest_close: f64,
        bias: TrendBias,
    ) -> Signal {
        let (current, previous) = match (snapshot.latest(), snapshot.previous()) {
            (Some(current), Some(previous)) => (current, previous),
            _ => return Signal::none(instrument, latest_close, DateTime::<Utc>::default()),
        };

        let direction = if self.long_conditions(bias, &current, &previous, latest_close) {
            Direction::Long
        } else if self.short_conditions(bias, &current, &previous, latest_close) {
            Direction::Short
        } else {
            Direction::None
        };

        // Stop sits beyond the bar before the trigger bar
        let stop_price = match direction {
            Direction::Long => previous.low,
            Direction::Short => previous.high,
            Direction::None => latest_close,
        };

        let confidence = self.confidence(bias, &current, direction);

        if direction != Direction::None {
            log::info!(
                "{} signal for {} @ {:.4} (stop {:.4}, trend {}, RSI {:.2}, confidence {:.2})",
                direction,
                instrument,
                latest_close,
                stop_price,
                bias,
                current.rsi.unwrap_or_default(),
                confidence
            );
        }

        Signal {
            instrument: instrument.to_string(),
            direction,
            reference_price: latest_close,
            stop_price,
            timestamp: current.open_time,
            confidence,
        }
    }

    fn long_conditions(
        &self,
        bias: TrendBias,
        current: &IndicatorPoint,
        previous: &IndicatorPoint,
        close: f64,
    ) -> bool {
        if bias != TrendBias::Bullish {
            return false;
        }

        let crossed_up = match (previous.ema_fast, current.ema_fast) {
            (Some(prev_ema), Some(ema)) => previous.close <= prev_ema && close > ema,
            _ => false,
        };
        if !crossed_up {
            return false;
        }

        let rsi_ok = current
            .rsi
            .map_or(false, |rsi| rsi >= self.thresholds.rsi_mid && rsi <= self.thresholds.rsi_overbought);
        if !rsi_ok {
            return false;
        }

        matches!((current.macd, current.macd_signal), (Some(macd), Some(signal)) if macd > signal && macd > 0.0)
    }

    fn short_conditions(
        &self,
        bias: TrendBias,
        current: &IndicatorPoint,
        previous: &IndicatorPoint,
        close: f64,
    ) -> bool {
        if bias != TrendBias::Bearish {
            return false;
        }

        let crossed_down = match (previous.ema_fast, current.ema_fast) {
            (Some(prev_ema), Some(ema)) => previous.close >= prev_ema && close < ema,
            _ => false,
        };
        if !crossed_down {
            return false;
        }

        let rsi_ok = current
            .rsi
            .map_or(false, |rsi| rsi >= self.thresholds.rsi_oversold && rsi <= self.thresholds.rsi_mid);
        if !rsi_ok {
            return false;
        }

        matches!((current.macd, current.macd_signal), (Some(macd), Some(signal)) if macd < signal && macd < 0.0)
    }

    /// Score in [0, 1] of how many confirmations line up behind the decision.
    fn confidence(&self, bias: TrendBias, current: &IndicatorPoint, direction: Direction) -> f64 {
        let mut confidence: f64 = 0.0;

        if bias != TrendBias::Neutral {
            confidence += 0.3;
        }

        if let Some(rsi) = current.rsi {
            if rsi > self.thresholds.rsi_oversold && rsi < self.thresholds.rsi_overbought {
                confidence += 0.2;
            }
        }

        if let (Some(macd), Some(signal)) = (current.macd, current.macd_signal) {
            let confirms = match direction {
                Direction::Long => macd > signal && macd > 0.0,
                Direction::Short => macd < signal && macd < 0.0,
                Direction::None => false,
            };
            if confirms {
                confidence += 0.3;
            }
        }

        if direction != Direction::None {
            confidence += 0.2;
        }

        confidence.min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Candle;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    struct Bars {
        prev_close: f64,
        prev_ema: f64,
        close: f64,
        ema: f64,
        rsi: f64,
        macd: f64,
        signal: f64,
    }

    fn snapshot(bars: &Bars) -> IndicatorSnapshot {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let candles = vec![
            Candle::new(start, bars.prev_close, bars.prev_close + 2.0, bars.prev_close - 2.0, bars.prev_close, 5.0),
            Candle::new(start + Duration::minutes(15), bars.prev_close, bars.close + 1.0, bars.close - 1.0, bars.close, 5.0),
        ];
        IndicatorSnapshot {
            candles,
            ema_fast: vec![Some(bars.prev_ema), Some(bars.ema)],
            ema_slow: vec![None, Some(bars.ema)],
            rsi: vec![Some(bars.rsi), Some(bars.rsi)],
            macd_line: vec![Some(bars.macd), Some(bars.macd)],
            macd_signal: vec![Some(bars.signal), Some(bars.signal)],
            macd_histogram: vec![Some(bars.macd - bars.signal), Some(bars.macd - bars.signal)],
        }
    }

    fn long_setup() -> Bars {
        Bars {
            prev_close: 99.0,
            prev_ema: 99.5,
            close: 101.0,
            ema: 100.0,
            rsi: 60.0,
            macd: 0.8,
            signal: 0.5,
        }
    }

    fn short_setup() -> Bars {
        Bars {
            prev_close: 101.0,
            prev_ema: 100.5,
            close: 99.0,
            ema: 100.0,
            rsi: 40.0,
            macd: -0.8,
            signal: -0.5,
        }
    }

    fn evaluate(bars: &Bars, bias: TrendBias) -> Signal {
        SignalEvaluator::default().evaluate("BTCUSDT", &snapshot(bars), bars.close, bias)
    }

    #[test]
    fn long_on_upward_cross_in_bullish_trend() {
        let signal = evaluate(&long_setup(), TrendBias::Bullish);
        assert_eq!(signal.direction, Direction::Long);
        assert_eq!(signal.reference_price, 101.0);
        // previous bar low, not the trigger bar's
        assert_eq!(signal.stop_price, 97.0);
        assert_eq!(signal.instrument, "BTCUSDT");
        assert!((signal.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn short_on_downward_cross_in_bearish_trend() {
        let signal = evaluate(&short_setup(), TrendBias::Bearish);
        assert_eq!(signal.direction, Direction::Short);
        assert_eq!(signal.stop_price, 103.0);
    }

    #[test]
    fn trend_must_agree() {
        assert_eq!(evaluate(&long_setup(), TrendBias::Bearish).direction, Direction::None);
        assert_eq!(evaluate(&long_setup(), TrendBias::Neutral).direction, Direction::None);
        assert_eq!(evaluate(&short_setup(), TrendBias::Bullish).direction, Direction::None);
        assert_eq!(evaluate(&short_setup(), TrendBias::Neutral).direction, Direction::None);
    }

    #[test]
    fn staying_above_ema_is_not_a_crossover() {
        let bars = Bars {
            prev_close: 100.0,
            prev_ema: 99.0,
            ..long_setup()
        };
        assert_eq!(evaluate(&bars, TrendBias::Bullish).direction, Direction::None);
    }

    #[test]
    fn previous_close_on_ema_counts_as_below() {
        let bars = Bars {
            prev_close: 99.5,
            prev_ema: 99.5,
            ..long_setup()
        };
        assert_eq!(evaluate(&bars, TrendBias::Bullish).direction, Direction::Long);
    }

    #[test]
    fn rsi_band_is_inclusive() {
        for rsi in [50.0, 70.0] {
            let bars = Bars { rsi, ..long_setup() };
            assert_eq!(evaluate(&bars, TrendBias::Bullish).direction, Direction::Long);
        }
        for rsi in [49.9, 70.1] {
            let bars = Bars { rsi, ..long_setup() };
            assert_eq!(evaluate(&bars, TrendBias::Bullish).direction, Direction::None);
        }
        for rsi in [30.0, 50.0] {
            let bars = Bars { rsi, ..short_setup() };
            assert_eq!(evaluate(&bars, TrendBias::Bearish).direction, Direction::Short);
        }
    }

    #[test]
    fn macd_must_confirm() {
        let below_signal = Bars { macd: 0.4, ..long_setup() };
        assert_eq!(evaluate(&below_signal, TrendBias::Bullish).direction, Direction::None);

        let negative = Bars {
            macd: -0.1,
            signal: -0.3,
            ..long_setup()
        };
        assert_eq!(evaluate(&negative, TrendBias::Bullish).direction, Direction::None);
    }

    #[test]
    fn missing_values_yield_no_signal() {
        let mut snap = snapshot(&long_setup());
        snap.ema_fast[0] = None;
        let signal = SignalEvaluator::default().evaluate("BTCUSDT", &snap, 101.0, TrendBias::Bullish);
        assert_eq!(signal.direction, Direction::None);

        let mut single = snapshot(&long_setup());
        single.candles.truncate(1);
        let signal = SignalEvaluator::default().evaluate("BTCUSDT", &single, 101.0, TrendBias::Bullish);
        assert!(!signal.is_actionable());
    }

    #[test]
    fn none_signal_still_scores_context() {
        let signal = evaluate(&long_setup(), TrendBias::Neutral);
        // RSI inside the band only
        assert!((signal.confidence - 0.2).abs() < 1e-9);
    }

    fn any_bias() -> impl Strategy<Value = TrendBias> {
        prop_oneof![
            Just(TrendBias::Bullish),
            Just(TrendBias::Bearish),
            Just(TrendBias::Neutral)
        ]
    }

    proptest! {
        #[test]
        fn direction_never_contradicts_trend(
            prev_close in 90.0..110.0_f64,
            prev_ema in 90.0..110.0_f64,
            close in 90.0..110.0_f64,
            ema in 90.0..110.0_f64,
            rsi in 0.0..100.0_f64,
            macd in -2.0..2.0_f64,
            signal in -2.0..2.0_f64,
            bias in any_bias(),
        ) {
            let bars = Bars { prev_close, prev_ema, close, ema, rsi, macd, signal };
            let result = evaluate(&bars, bias);
            if bias != TrendBias::Bullish {
                prop_assert_ne!(result.direction, Direction::Long);
            }
            if bias != TrendBias::Bearish {
                prop_assert_ne!(result.direction, Direction::Short);
            }
            prop_assert!(result.confidence >= 0.0 && result.confidence <= 1.0);
        }
    }
}
