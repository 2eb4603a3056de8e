// src/main.rs
use std::sync::Arc;

use auto_futures::config::Config;
use auto_futures::domain::errors::AppResult;
use auto_futures::exchange::{AccountSource, BinanceGateway, OrderSink, PaperOrderSink, StaticEquity};
use auto_futures::trading_bot::TradingBot;

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load configuration: a JSON file when given, the environment otherwise
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    // Initialize logging
    config.init_logging()?;

    log::info!("Starting auto_futures v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Instruments: {}", config.trading.symbols.join(", "));

    let quote_asset = config.exchange.quote_asset.clone();
    let precision = config.trading.quantity_precision;
    let credentials = config.exchange.credentials().map(|(k, s)| (k.to_string(), s.to_string()));

    let gateway = Arc::new(match &credentials {
        Some((key, secret)) => BinanceGateway::with_credentials(key, secret, &quote_asset, precision),
        None => BinanceGateway::public(&quote_asset, precision),
    });

    let account: Arc<dyn AccountSource> = if credentials.is_some() {
        gateway.clone()
    } else {
        log::info!("No API credentials, using paper equity of {}", config.trading.paper_equity);
        Arc::new(StaticEquity::new(config.trading.paper_equity))
    };

    let orders: Arc<dyn OrderSink> = match (config.trading.auto_trading, credentials.is_some()) {
        (true, true) => {
            log::warn!("Auto trading enabled: live market orders will be sent");
            gateway.clone()
        }
        (true, false) => {
            log::warn!("Auto trading requested without credentials, falling back to paper orders");
            Arc::new(PaperOrderSink::new())
        }
        _ => Arc::new(PaperOrderSink::new()),
    };

    let mut bot = TradingBot::new(config, gateway, account, orders);
    bot.load_positions()?;
    bot.run().await?;

    Ok(())
}
