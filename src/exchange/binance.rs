// src/exchange/binance.rs
use async_trait::async_trait;
use binance_spot_connector_rust::{
    http::{request::Request, Credentials},
    hyper::BinanceHttpClient,
    market::{self, klines::KlineInterval},
    trade::{self, order::Side},
};
use hyper::client::HttpConnector;
use hyper_tls::HttpsConnector;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

use crate::domain::errors::{ExchangeError, ExchangeResult};
use crate::domain::models::{Candle, CloseIntent, OpenIntent, OrderSide, PositionSide, Timeframe};
use crate::exchange::client::{AccountSource, MarketDataSource, OrderReceipt, OrderSink};

/// Largest `limit` the klines endpoint accepts
pub const MAX_KLINES_PER_REQUEST: usize = 1000;

/// Binance REST gateway: klines and prices for everyone, account equity and
/// market orders when credentials are configured.
pub struct BinanceGateway {
    client: BinanceHttpClient<HttpsConnector<HttpConnector>>,
    authenticated: bool,
    quote_asset: String,
    quantity_precision: u32,
}

impl BinanceGateway {
    /// Public market data only
    pub fn public(quote_asset: &str, quantity_precision: u32) -> Self {
        Self {
            client: BinanceHttpClient::default(),
            authenticated: false,
            quote_asset: quote_asset.to_string(),
            quantity_precision,
        }
    }

    pub fn with_credentials(
        api_key: &str,
        api_secret: &str,
        quote_asset: &str,
        quantity_precision: u32,
    ) -> Self {
        let credentials = Credentials::from_hmac(api_key.to_string(), api_secret.to_string());
        Self {
            client: BinanceHttpClient::default().credentials(credentials),
            authenticated: true,
            quote_asset: quote_asset.to_string(),
            quantity_precision,
        }
    }

    async fn send(&self, request: impl Into<Request>) -> ExchangeResult<String> {
        let response = self
            .client
            .send(request)
            .await
            .map_err(|e| ExchangeError::DataUnavailable(format!("{:?}", e)))?;

        response
            .into_body_str()
            .await
            .map_err(|e| ExchangeError::DataUnavailable(format!("{:?}", e)))
    }

    fn require_credentials(&self) -> ExchangeResult<()> {
        if self.authenticated {
            Ok(())
        } else {
            Err(ExchangeError::Authentication("API credentials are not configured".to_string()))
        }
    }

    async fn market_order(&self, symbol: &str, side: OrderSide, quantity: f64) -> ExchangeResult<OrderReceipt> {
        self.require_credentials()?;

        let quantity = truncate_quantity(quantity, self.quantity_precision)?;
        let binance_side = match side {
            OrderSide::Buy => Side::Buy,
            OrderSide::Sell => Side::Sell,
        };

        let body = self
            .client
            .send(trade::new_order(symbol, binance_side, "MARKET").quantity(quantity))
            .await
            .map_err(|e| ExchangeError::Order(format!("{:?}", e)))?
            .into_body_str()
            .await
            .map_err(|e| ExchangeError::Order(format!("{:?}", e)))?;

        log::info!("Order result: {}", body);

        let order_id = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v["orderId"].as_i64())
            .map(|id| id.to_string());

        Ok(OrderReceipt {
            instrument: symbol.to_string(),
            side,
            quantity: quantity.to_f64().unwrap_or_default(),
            order_id,
        })
    }
}

#[async_trait]
impl MarketDataSource for BinanceGateway {
    async fn get_candles(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> ExchangeResult<Vec<Candle>> {
        let limit = count.min(MAX_KLINES_PER_REQUEST) as u32;
        let body = self
            .send(market::klines(instrument, kline_interval(timeframe)).limit(limit))
            .await?;
        parse_klines(&body)
    }

    async fn get_price(&self, instrument: &str) -> ExchangeResult<f64> {
        let body = self.send(market::ticker_price().symbol(instrument)).await?;
        parse_ticker_price(&body)
    }
}

#[async_trait]
impl AccountSource for BinanceGateway {
    async fn get_equity(&self) -> ExchangeResult<f64> {
        self.require_credentials()?;
        let body = self.send(trade::account()).await?;
        parse_equity(&body, &self.quote_asset)
    }
}

/// Spot market orders only. Stops and take profits stay with the position
/// manager, and shorts are refused since a spot account cannot sell what it
/// does not hold.
#[async_trait]
impl OrderSink for BinanceGateway {
    async fn open(&self, intent: &OpenIntent) -> ExchangeResult<OrderReceipt> {
        refuse_short(&intent.instrument, intent.side)?;
        self.market_order(&intent.instrument, intent.side.entry_order_side(), intent.quantity)
            .await
    }

    async fn close(&self, intent: &CloseIntent) -> ExchangeResult<OrderReceipt> {
        refuse_short(&intent.instrument, intent.side)?;
        self.market_order(&intent.instrument, intent.side.exit_order_side(), intent.quantity)
            .await
    }
}

fn refuse_short(instrument: &str, side: PositionSide) -> ExchangeResult<()> {
    match side {
        PositionSide::Long => Ok(()),
        PositionSide::Short => Err(ExchangeError::Order(format!(
            "Short {} is not supported on the spot gateway",
            instrument
        ))),
    }
}

pub fn kline_interval(timeframe: Timeframe) -> KlineInterval {
    match timeframe {
        Timeframe::Minutes1 => KlineInterval::Minutes1,
        Timeframe::Minutes3 => KlineInterval::Minutes3,
        Timeframe::Minutes5 => KlineInterval::Minutes5,
        Timeframe::Minutes15 => KlineInterval::Minutes15,
        Timeframe::Minutes30 => KlineInterval::Minutes30,
        Timeframe::Hours1 => KlineInterval::Hours1,
        Timeframe::Hours2 => KlineInterval::Hours2,
        Timeframe::Hours4 => KlineInterval::Hours4,
        Timeframe::Hours6 => KlineInterval::Hours6,
        Timeframe::Hours8 => KlineInterval::Hours8,
        Timeframe::Hours12 => KlineInterval::Hours12,
        Timeframe::Days1 => KlineInterval::Days1,
    }
}

/// Truncates toward zero to `precision` decimal places.
pub fn truncate_quantity(quantity: f64, precision: u32) -> ExchangeResult<Decimal> {
    let truncated = Decimal::from_f64(quantity)
        .ok_or_else(|| ExchangeError::Order(format!("Invalid quantity: {}", quantity)))?
        .round_dp_with_strategy(precision, RoundingStrategy::ToZero);

    if truncated <= Decimal::ZERO {
        return Err(ExchangeError::Order(format!(
            "Quantity {} truncates to zero at {} decimals",
            quantity, precision
        )));
    }
    Ok(truncated)
}

fn parse_number(value: &Value, field: &str) -> ExchangeResult<f64> {
    match value {
        Value::String(s) => f64::from_str(s)
            .map_err(|e| ExchangeError::Parse(format!("Failed to parse {} '{}': {}", field, s, e))),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| ExchangeError::Parse(format!("Invalid {}: {}", field, n))),
        other => Err(ExchangeError::Parse(format!("Unexpected {} value: {}", field, other))),
    }
}

fn parse_open_time(value: &Value) -> ExchangeResult<DateTime<Utc>> {
    let millis = value
        .as_i64()
        .ok_or_else(|| ExchangeError::Parse(format!("Invalid open time: {}", value)))?;
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| ExchangeError::Parse(format!("Open time out of range: {}", millis)))
}

/// Parses the kline array format:
/// `[open_time, open, high, low, close, volume, close_time, ...]`
pub fn parse_klines(body: &str) -> ExchangeResult<Vec<Candle>> {
    let raw: Vec<Vec<Value>> = serde_json::from_str(body)
        .map_err(|e| ExchangeError::Parse(format!("Failed to parse klines: {}", e)))?;

    raw.iter()
        .map(|row| {
            if row.len() < 6 {
                return Err(ExchangeError::Parse(format!(
                    "Kline row has {} fields, expected at least 6",
                    row.len()
                )));
            }
            Ok(Candle::new(
                parse_open_time(&row[0])?,
                parse_number(&row[1], "open")?,
                parse_number(&row[2], "high")?,
                parse_number(&row[3], "low")?,
                parse_number(&row[4], "close")?,
                parse_number(&row[5], "volume")?,
            ))
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: String,
}

pub fn parse_ticker_price(body: &str) -> ExchangeResult<f64> {
    let ticker: TickerPrice = serde_json::from_str(body)
        .map_err(|e| ExchangeError::Parse(format!("Failed to parse ticker price: {}", e)))?;
    f64::from_str(&ticker.price)
        .map_err(|e| ExchangeError::Parse(format!("Invalid price '{}': {}", ticker.price, e)))
}

#[derive(Debug, Deserialize)]
struct AccountBalance {
    asset: String,
    free: String,
    locked: String,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    balances: Vec<AccountBalance>,
}

/// Free plus locked balance of `quote_asset`; zero when the asset is absent.
pub fn parse_equity(body: &str, quote_asset: &str) -> ExchangeResult<f64> {
    let account: AccountInfo = serde_json::from_str(body)
        .map_err(|e| ExchangeError::Parse(format!("Failed to parse account: {}", e)))?;

    let balance = match account.balances.iter().find(|b| b.asset == quote_asset) {
        Some(balance) => balance,
        None => return Ok(0.0),
    };

    let parse = |s: &str| {
        Decimal::from_str(s).map_err(|e| ExchangeError::Parse(format!("Failed to parse balance '{}': {}", s, e)))
    };
    let total = parse(&balance.free)? + parse(&balance.locked)?;
    total
        .to_f64()
        .ok_or_else(|| ExchangeError::Parse(format!("Balance out of range: {}", total)))
}
