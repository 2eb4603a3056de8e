// src/lib.rs
// Library module declarations

pub mod analysis;
pub mod config;
pub mod domain;
pub mod exchange;
pub mod trading;
pub mod trading_bot;

pub use config::Config;
pub use trading_bot::{CycleReport, TradingBot};
