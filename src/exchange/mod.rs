// src/exchange/mod.rs
pub mod binance;
pub mod client;
pub mod paper;

pub use binance::BinanceGateway;
pub use client::{AccountSource, MarketDataSource, OrderReceipt, OrderSink};
pub use paper::{JournalEntry, PaperOrderSink, StaticEquity};
