// src/analysis/mod.rs
pub mod indicators;
pub mod trend;

pub use indicators::{IndicatorPoint, IndicatorSettings, IndicatorSnapshot};
pub use trend::classify_trend;
