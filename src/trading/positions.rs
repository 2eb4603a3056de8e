// src/trading/positions.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::domain::errors::{AppResult, TradingError, TradingResult};
use crate::domain::models::{CloseIntent, ExitReason, OpenIntent, PositionSide};
use crate::trading::risk::{RiskParameters, SizedTrade};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionStatus {
    Pending,
    Open,
    Closed,
}

/// A leveraged position owned by the [`PositionManager`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub instrument: String,
    pub side: PositionSide,
    pub entry_price: f64,
    pub quantity: f64,
    pub stop_price: f64,
    pub take_profit_price: f64,
    pub trailing_stop_price: Option<f64>,
    pub status: PositionStatus,
    pub opened_at: DateTime<Utc>,
    /// Last price seen by the monitor, used for unrealized PnL
    pub last_price: f64,
}

impl Position {
    /// Creates a PENDING position from a sized trade.
    pub fn pending(trade: &SizedTrade, opened_at: DateTime<Utc>) -> Self {
        Self {
            instrument: trade.instrument.clone(),
            side: trade.side,
            entry_price: trade.entry_price,
            quantity: trade.quantity,
            stop_price: trade.stop_price,
            take_profit_price: trade.take_profit_price,
            trailing_stop_price: None,
            status: PositionStatus::Pending,
            opened_at,
            last_price: trade.entry_price,
        }
    }

    /// Trailing stop when armed, otherwise the static stop.
    pub fn effective_stop(&self) -> f64 {
        self.trailing_stop_price.unwrap_or(self.stop_price)
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        match self.side {
            PositionSide::Long => (price - self.entry_price) * self.quantity,
            PositionSide::Short => (self.entry_price - price) * self.quantity,
        }
    }

    /// Favourable move from entry as a fraction of entry.
    pub fn gain_pct(&self, price: f64) -> f64 {
        match self.side {
            PositionSide::Long => (price - self.entry_price) / self.entry_price,
            PositionSide::Short => (self.entry_price - price) / self.entry_price,
        }
    }

    pub fn exit_reason(&self, price: f64) -> Option<ExitReason> {
        let stop = self.effective_stop();
        let (stop_hit, target_hit) = match self.side {
            PositionSide::Long => (price <= stop, price >= self.take_profit_price),
            PositionSide::Short => (price >= stop, price <= self.take_profit_price),
        };

        if stop_hit {
            if self.trailing_stop_price.is_some() {
                Some(ExitReason::TrailingStop)
            } else {
                Some(ExitReason::StopLoss)
            }
        } else if target_hit {
            Some(ExitReason::TakeProfit)
        } else {
            None
        }
    }

    /// Prices and quantity positive and finite, stop and take profit on
    /// their own side of entry, trailing stop no looser than the static one.
    pub fn check_levels(&self) -> TradingResult<()> {
        let values = [
            self.entry_price,
            self.quantity,
            self.stop_price,
            self.take_profit_price,
            self.last_price,
            self.trailing_stop_price.unwrap_or(self.stop_price),
        ];
        if values.iter().any(|v| !(*v > 0.0) || !v.is_finite()) {
            return Err(TradingError::InvalidTrade(format!(
                "non-positive price or quantity for {}: {:?}",
                self.instrument, values
            )));
        }

        let stop = self.effective_stop();
        let ordered = match self.side {
            PositionSide::Long => {
                self.stop_price < self.entry_price && self.entry_price < self.take_profit_price && stop >= self.stop_price
            }
            PositionSide::Short => {
                self.stop_price > self.entry_price && self.entry_price > self.take_profit_price && stop <= self.stop_price
            }
        };
        if !ordered {
            return Err(TradingError::InvalidStop(format!(
                "{} {} levels out of order: stop {}, trailing {:?}, entry {}, take profit {}",
                self.side, self.instrument, self.stop_price, self.trailing_stop_price, self.entry_price, self.take_profit_price
            )));
        }
        Ok(())
    }

    pub fn open_intent(&self) -> OpenIntent {
        OpenIntent {
            instrument: self.instrument.clone(),
            side: self.side,
            quantity: self.quantity,
            stop_price: self.stop_price,
            take_profit_price: self.take_profit_price,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdmissionRejected {
    DuplicateInstrument(String),
    CapacityReached { open: usize, max: usize },
}

impl fmt::Display for AdmissionRejected {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AdmissionRejected::DuplicateInstrument(instrument) => {
                write!(f, "position already open for {}", instrument)
            }
            AdmissionRejected::CapacityReached { open, max } => {
                write!(f, "capacity reached ({}/{})", open, max)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdmissionOutcome {
    Opened(Position),
    Rejected(AdmissionRejected),
}

/// A position that left the open set.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedPosition {
    pub position: Position,
    pub exit_price: f64,
    pub reason: ExitReason,
    pub realized_pnl: f64,
}

impl ClosedPosition {
    pub fn close_intent(&self) -> CloseIntent {
        CloseIntent {
            instrument: self.position.instrument.clone(),
            side: self.position.side,
            quantity: self.position.quantity,
            reason: self.reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrailingUpdate {
    pub instrument: String,
    pub previous_stop: f64,
    pub new_stop: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MonitorOutcome {
    Closed(ClosedPosition),
    TrailingAdvanced(TrailingUpdate),
    Held,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PositionSummary {
    pub open: usize,
    pub longs: usize,
    pub shorts: usize,
    pub trailing_active: usize,
    pub unrealized_pnl: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PositionsSnapshot {
    saved_at: DateTime<Utc>,
    positions: Vec<Position>,
}

/// Owns the open-position set. Positions are kept in admission order.
pub struct PositionManager {
    params: RiskParameters,
    open: Vec<Position>,
}

impl PositionManager {
    pub fn new(params: RiskParameters) -> Self {
        Self {
            params,
            open: Vec::new(),
        }
    }

    pub fn positions(&self) -> &[Position] {
        &self.open
    }

    pub fn get(&self, instrument: &str) -> Option<&Position> {
        self.open.iter().find(|p| p.instrument == instrument)
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    pub fn has_capacity(&self) -> bool {
        self.open.len() < self.params.max_concurrent_positions
    }

    /// Instruments with an open position, in admission order.
    pub fn instruments(&self) -> Vec<String> {
        self.open.iter().map(|p| p.instrument.clone()).collect()
    }

    /// Moves a PENDING position to OPEN when the instrument is free and the
    /// concurrency limit allows it.
    pub fn admit(&mut self, mut position: Position) -> AdmissionOutcome {
        if self.get(&position.instrument).is_some() {
            log::warn!("Admission rejected for {}: position already open", position.instrument);
            return AdmissionOutcome::Rejected(AdmissionRejected::DuplicateInstrument(position.instrument));
        }

        if !self.has_capacity() {
            log::warn!(
                "Admission rejected for {}: {}/{} positions open",
                position.instrument,
                self.open.len(),
                self.params.max_concurrent_positions
            );
            return AdmissionOutcome::Rejected(AdmissionRejected::CapacityReached {
                open: self.open.len(),
                max: self.params.max_concurrent_positions,
            });
        }

        position.status = PositionStatus::Open;
        log::info!(
            "Opened {} {} qty={:.6} entry={:.4} stop={:.4} tp={:.4}",
            position.side,
            position.instrument,
            position.quantity,
            position.entry_price,
            position.stop_price,
            position.take_profit_price
        );
        self.open.push(position.clone());
        AdmissionOutcome::Opened(position)
    }

    /// Closes the position if `price` crossed its effective stop or take profit.
    pub fn check_exit(&mut self, instrument: &str, price: f64) -> Option<ClosedPosition> {
        let index = self.open.iter().position(|p| p.instrument == instrument)?;
        let reason = self.open[index].exit_reason(price)?;

        let mut position = self.open.remove(index);
        position.status = PositionStatus::Closed;
        position.last_price = price;
        let realized_pnl = position.unrealized_pnl(price);

        log::info!(
            "Closed {} {} at {:.4} ({}), realized PnL {:.4}",
            position.side,
            position.instrument,
            price,
            reason,
            realized_pnl
        );

        Some(ClosedPosition {
            position,
            exit_price: price,
            reason,
            realized_pnl,
        })
    }

    /// Ratchets the trailing stop once the gain reaches the activation
    /// threshold. Returns the update only when the stop actually moved.
    pub fn update_trailing(&mut self, instrument: &str, price: f64) -> Option<TrailingUpdate> {
        let activation = self.params.trailing_activation_pct;
        let offset = self.params.trailing_offset_pct;
        let position = self.open.iter_mut().find(|p| p.instrument == instrument)?;

        if position.gain_pct(price) < activation {
            return None;
        }

        let current = position.effective_stop();
        let candidate = match position.side {
            PositionSide::Long => price * (1.0 - offset),
            PositionSide::Short => price * (1.0 + offset),
        };
        let tighter = match position.side {
            PositionSide::Long => candidate > current,
            PositionSide::Short => candidate < current,
        };
        if !tighter {
            return None;
        }

        position.trailing_stop_price = Some(candidate);
        log::info!(
            "Trailing stop for {} {} moved {:.4} -> {:.4}",
            position.side,
            position.instrument,
            current,
            candidate
        );

        Some(TrailingUpdate {
            instrument: position.instrument.clone(),
            previous_stop: current,
            new_stop: candidate,
        })
    }

    /// One monitoring step for an instrument: records the price, checks the
    /// exit first and only then advances the trailing stop.
    pub fn monitor(&mut self, instrument: &str, price: f64) -> Option<MonitorOutcome> {
        let position = self.open.iter_mut().find(|p| p.instrument == instrument)?;
        position.last_price = price;

        if let Some(closed) = self.check_exit(instrument, price) {
            return Some(MonitorOutcome::Closed(closed));
        }

        Some(match self.update_trailing(instrument, price) {
            Some(update) => MonitorOutcome::TrailingAdvanced(update),
            None => MonitorOutcome::Held,
        })
    }

    pub fn summary(&self) -> PositionSummary {
        self.open.iter().fold(PositionSummary::default(), |mut summary, p| {
            summary.open += 1;
            match p.side {
                PositionSide::Long => summary.longs += 1,
                PositionSide::Short => summary.shorts += 1,
            }
            if p.trailing_stop_price.is_some() {
                summary.trailing_active += 1;
            }
            summary.unrealized_pnl += p.unrealized_pnl(p.last_price);
            summary
        })
    }

    /// Writes the open set as pretty JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> AppResult<()> {
        let snapshot = PositionsSnapshot {
            saved_at: Utc::now(),
            positions: self.open.clone(),
        };
        let contents = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Restores a manager from a snapshot file. A missing file yields an
    /// empty open set; entries that are not OPEN, that carry broken levels or
    /// that would break the admission rules are dropped.
    pub fn load<P: AsRef<Path>>(params: RiskParameters, path: P) -> AppResult<Self> {
        let mut manager = Self::new(params);
        let path = path.as_ref();
        if !path.exists() {
            return Ok(manager);
        }

        let contents = std::fs::read_to_string(path)?;
        let snapshot: PositionsSnapshot = serde_json::from_str(&contents)?;

        for position in snapshot.positions {
            if position.status != PositionStatus::Open {
                continue;
            }
            if let Err(e) = position.check_levels() {
                log::warn!("Dropped position from snapshot: {}", e);
                continue;
            }
            if let AdmissionOutcome::Rejected(reason) = manager.admit(position) {
                log::warn!("Dropped position from snapshot: {}", reason);
            }
        }

        log::info!(
            "Restored {} open positions from {} (saved {})",
            manager.open_count(),
            path.display(),
            snapshot.saved_at
        );
        Ok(manager)
    }
}
