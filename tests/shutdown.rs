// tests/shutdown.rs
#![cfg(unix)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use auto_futures::exchange::paper::PaperOrderSink;
use auto_futures::trading_bot::TradingBot;

use common::{entry_candles, rising_trend_candles, test_config, CountingEquity, MockMarket};

#[tokio::test]
async fn sigterm_stops_the_bot_and_saves_positions() {
    let path = std::env::temp_dir().join(format!("bot-sigterm-{}.json", std::process::id()));
    let market = Arc::new(MockMarket::new(rising_trend_candles(), entry_candles()));
    market.set_price("BTCUSDT", 105.16);

    let mut config = test_config(&["BTCUSDT"]);
    config.trading.positions_file = path.to_string_lossy().to_string();
    let mut bot = TradingBot::new(
        config,
        market,
        Arc::new(CountingEquity::new(10_000.0)),
        Arc::new(PaperOrderSink::new()),
    );

    let terminate = async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let status = std::process::Command::new("sh")
            .args(["-c", &format!("kill -TERM {}", std::process::id())])
            .status()
            .unwrap();
        assert!(status.success());
    };

    let (result, ()) = tokio::join!(bot.run(), terminate);
    result.unwrap();
    assert_eq!(bot.positions().open_count(), 1);

    let saved = std::fs::read_to_string(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert!(saved.contains("BTCUSDT"));
}
