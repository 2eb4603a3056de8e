// src/exchange/client.rs
use crate::domain::errors::ExchangeResult;
use crate::domain::models::{Candle, CloseIntent, OpenIntent, OrderSide, Timeframe};
use async_trait::async_trait;
use std::sync::Arc;

/// Candle and price feed
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Get the most recent `count` candles, oldest first
    async fn get_candles(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> ExchangeResult<Vec<Candle>>;

    /// Get the last traded price
    async fn get_price(&self, instrument: &str) -> ExchangeResult<f64>;
}

/// Account equity in the quote asset
#[async_trait]
pub trait AccountSource: Send + Sync {
    async fn get_equity(&self) -> ExchangeResult<f64>;
}

/// Destination for open and close intents
#[async_trait]
pub trait OrderSink: Send + Sync {
    async fn open(&self, intent: &OpenIntent) -> ExchangeResult<OrderReceipt>;

    async fn close(&self, intent: &CloseIntent) -> ExchangeResult<OrderReceipt>;
}

/// What the sink reports back for an accepted order
#[derive(Debug, Clone, PartialEq)]
pub struct OrderReceipt {
    pub instrument: String,
    pub side: OrderSide,
    /// Quantity actually sent, after precision truncation
    pub quantity: f64,
    pub order_id: Option<String>,
}

#[async_trait]
impl<T: MarketDataSource + ?Sized> MarketDataSource for Arc<T> {
    async fn get_candles(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> ExchangeResult<Vec<Candle>> {
        (**self).get_candles(instrument, timeframe, count).await
    }

    async fn get_price(&self, instrument: &str) -> ExchangeResult<f64> {
        (**self).get_price(instrument).await
    }
}

#[async_trait]
impl<T: AccountSource + ?Sized> AccountSource for Arc<T> {
    async fn get_equity(&self) -> ExchangeResult<f64> {
        (**self).get_equity().await
    }
}

#[async_trait]
impl<T: OrderSink + ?Sized> OrderSink for Arc<T> {
    async fn open(&self, intent: &OpenIntent) -> ExchangeResult<OrderReceipt> {
        (**self).open(intent).await
    }

    async fn close(&self, intent: &CloseIntent) -> ExchangeResult<OrderReceipt> {
        (**self).close(intent).await
    }
}
