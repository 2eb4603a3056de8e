// src/trading/mod.rs
pub mod positions;
pub mod risk;
pub mod signals;

pub use positions::{
    AdmissionOutcome, AdmissionRejected, ClosedPosition, MonitorOutcome, Position, PositionManager,
    PositionStatus, PositionSummary, TrailingUpdate,
};
pub use risk::{RiskParameters, RiskSizer, SizedTrade};
pub use signals::{SignalEvaluator, SignalThresholds};
