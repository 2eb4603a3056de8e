// src/trading/risk.rs
use serde::{Deserialize, Serialize};

use crate::domain::errors::{TradingError, TradingResult};
use crate::domain::models::{PositionSide, Signal};

/// Risk management parameters, fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskParameters {
    /// Fraction of equity put at risk by one trade (0.01 = 1%)
    pub max_risk_per_trade: f64,
    pub max_concurrent_positions: usize,
    pub risk_reward_ratio: f64,
    /// Unrealized gain, as a fraction of entry, that arms the trailing stop
    pub trailing_activation_pct: f64,
    /// Distance of the trailing stop from the current price, as a fraction of it
    pub trailing_offset_pct: f64,
    /// Smallest stop distance accepted by the sizer
    pub min_stop_distance: f64,
    /// Optional cap on position notional as a fraction of equity
    pub max_position_notional_pct: Option<f64>,
    pub min_order_notional: f64,
}

impl Default for RiskParameters {
    fn default() -> Self {
        Self {
            max_risk_per_trade: 0.01,
            max_concurrent_positions: 2,
            risk_reward_ratio: 1.5,
            trailing_activation_pct: 0.0075,
            trailing_offset_pct: 0.0075,
            min_stop_distance: 1e-8,
            max_position_notional_pct: None,
            min_order_notional: 0.0,
        }
    }
}

/// Executable trade derived from a signal. Quantity is unrounded; rounding to
/// the instrument's precision happens at the order sink.
#[derive(Debug, Clone, PartialEq)]
pub struct SizedTrade {
    pub instrument: String,
    pub side: PositionSide,
    pub entry_price: f64,
    pub stop_price: f64,
    pub take_profit_price: f64,
    pub quantity: f64,
}

impl SizedTrade {
    pub fn notional(&self) -> f64 {
        self.quantity * self.entry_price
    }

    pub fn risk_amount(&self) -> f64 {
        self.quantity * (self.entry_price - self.stop_price).abs()
    }
}

pub struct RiskSizer {
    params: RiskParameters,
}

impl RiskSizer {
    pub fn new(params: RiskParameters) -> Self {
        Self { params }
    }

    /// Sizes an actionable signal against the current equity.
    pub fn size_signal(&self, signal: &Signal, equity: f64) -> TradingResult<SizedTrade> {
        let side = signal
            .direction
            .side()
            .ok_or_else(|| TradingError::NoDirection(signal.instrument.clone()))?;

        let (quantity, take_profit_price) =
            self.size_position(equity, signal.reference_price, signal.stop_price, side)?;

        let trade = SizedTrade {
            instrument: signal.instrument.clone(),
            side,
            entry_price: signal.reference_price,
            stop_price: signal.stop_price,
            take_profit_price,
            quantity,
        };

        self.validate_trade(&trade)?;
        Ok(trade)
    }

    /// Returns `(quantity, take_profit_price)` for risking
    /// `equity * max_risk_per_trade` between `entry` and `stop`.
    pub fn size_position(
        &self,
        equity: f64,
        entry: f64,
        stop: f64,
        side: PositionSide,
    ) -> TradingResult<(f64, f64)> {
        if !(equity > 0.0) {
            return Err(TradingError::InvalidTrade(format!("equity must be positive, got {}", equity)));
        }
        if !(entry > 0.0) || !(stop > 0.0) {
            return Err(TradingError::InvalidTrade(format!(
                "prices must be positive (entry {}, stop {})",
                entry, stop
            )));
        }

        let distance = (entry - stop).abs();
        if !(distance > 0.0) || distance < self.params.min_stop_distance {
            return Err(TradingError::DegenerateStop {
                distance,
                tolerance: self.params.min_stop_distance,
            });
        }

        match side {
            PositionSide::Long if stop >= entry => {
                return Err(TradingError::InvalidStop(format!(
                    "LONG stop {} must be below entry {}",
                    stop, entry
                )))
            }
            PositionSide::Short if stop <= entry => {
                return Err(TradingError::InvalidStop(format!(
                    "SHORT stop {} must be above entry {}",
                    stop, entry
                )))
            }
            _ => {}
        }

        let risk_amount = equity * self.params.max_risk_per_trade;
        let mut quantity = risk_amount / distance;

        if let Some(cap_pct) = self.params.max_position_notional_pct {
            let max_quantity = equity * cap_pct / entry;
            if quantity > max_quantity {
                log::info!(
                    "Position size capped by notional limit: {:.6} -> {:.6}",
                    quantity,
                    max_quantity
                );
                quantity = max_quantity;
            }
        }

        let take_profit = self.take_profit(entry, stop, side);

        log::debug!(
            "Sized {} trade: equity={}, entry={}, stop={}, distance={}, quantity={}, take_profit={}",
            side,
            equity,
            entry,
            stop,
            distance,
            quantity,
            take_profit
        );

        Ok((quantity, take_profit))
    }

    pub fn take_profit(&self, entry: f64, stop: f64, side: PositionSide) -> f64 {
        let rr = self.params.risk_reward_ratio;
        match side {
            PositionSide::Long => entry + rr * (entry - stop),
            PositionSide::Short => entry - rr * (stop - entry),
        }
    }

    /// Final sanity check on a sized trade before it is admitted.
    pub fn validate_trade(&self, trade: &SizedTrade) -> TradingResult<()> {
        let values = [trade.entry_price, trade.stop_price, trade.take_profit_price, trade.quantity];
        if values.iter().any(|v| !(*v > 0.0) || !v.is_finite()) {
            return Err(TradingError::InvalidTrade(format!(
                "non-positive price or quantity for {}: {:?}",
                trade.instrument, values
            )));
        }

        let ordered = match trade.side {
            PositionSide::Long => trade.stop_price < trade.entry_price && trade.take_profit_price > trade.entry_price,
            PositionSide::Short => trade.stop_price > trade.entry_price && trade.take_profit_price < trade.entry_price,
        };
        if !ordered {
            return Err(TradingError::InvalidTrade(format!(
                "{} levels out of order for {}: stop {}, entry {}, take profit {}",
                trade.side, trade.instrument, trade.stop_price, trade.entry_price, trade.take_profit_price
            )));
        }

        if trade.notional() < self.params.min_order_notional {
            return Err(TradingError::InvalidTrade(format!(
                "notional {:.4} of {} is below the minimum {}",
                trade.notional(),
                trade.instrument,
                self.params.min_order_notional
            )));
        }

        let risk = (trade.entry_price - trade.stop_price).abs();
        let reward = (trade.take_profit_price - trade.entry_price).abs();
        let actual_rr = reward / risk;
        if actual_rr < self.params.risk_reward_ratio * 0.9 {
            log::warn!(
                "Suboptimal reward/risk for {}: {:.2} < {:.2}",
                trade.instrument,
                actual_rr,
                self.params.risk_reward_ratio
            );
        }

        Ok(())
    }
}
