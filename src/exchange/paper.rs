// src/exchange/paper.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::errors::{ExchangeError, ExchangeResult};
use crate::domain::models::{CloseIntent, OpenIntent};
use crate::exchange::client::{AccountSource, OrderReceipt, OrderSink};

/// Fixed equity for paper trading
pub struct StaticEquity {
    equity: f64,
}

impl StaticEquity {
    pub fn new(equity: f64) -> Self {
        Self { equity }
    }
}

#[async_trait]
impl AccountSource for StaticEquity {
    async fn get_equity(&self) -> ExchangeResult<f64> {
        if self.equity > 0.0 {
            Ok(self.equity)
        } else {
            Err(ExchangeError::DataUnavailable(format!("paper equity is {}", self.equity)))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JournalEntry {
    Open {
        at: DateTime<Utc>,
        intent: OpenIntent,
    },
    Close {
        at: DateTime<Utc>,
        intent: CloseIntent,
    },
}

/// Order sink that only records intents
#[derive(Default)]
pub struct PaperOrderSink {
    journal: Mutex<Vec<JournalEntry>>,
}

impl PaperOrderSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn journal(&self) -> Vec<JournalEntry> {
        self.journal.lock().await.clone()
    }
}

#[async_trait]
impl OrderSink for PaperOrderSink {
    async fn open(&self, intent: &OpenIntent) -> ExchangeResult<OrderReceipt> {
        log::info!(
            "[paper] {} {} qty={:.6} stop={:.4} tp={:.4}",
            intent.side.entry_order_side().as_str(),
            intent.instrument,
            intent.quantity,
            intent.stop_price,
            intent.take_profit_price
        );

        let mut journal = self.journal.lock().await;
        journal.push(JournalEntry::Open {
            at: Utc::now(),
            intent: intent.clone(),
        });

        Ok(OrderReceipt {
            instrument: intent.instrument.clone(),
            side: intent.side.entry_order_side(),
            quantity: intent.quantity,
            order_id: Some(format!("paper-{}", journal.len())),
        })
    }

    async fn close(&self, intent: &CloseIntent) -> ExchangeResult<OrderReceipt> {
        log::info!(
            "[paper] {} {} qty={:.6} ({})",
            intent.side.exit_order_side().as_str(),
            intent.instrument,
            intent.quantity,
            intent.reason
        );

        let mut journal = self.journal.lock().await;
        journal.push(JournalEntry::Close {
            at: Utc::now(),
            intent: intent.clone(),
        });

        Ok(OrderReceipt {
            instrument: intent.instrument.clone(),
            side: intent.side.exit_order_side(),
            quantity: intent.quantity,
            order_id: Some(format!("paper-{}", journal.len())),
        })
    }
}
