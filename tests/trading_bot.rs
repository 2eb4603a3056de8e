// tests/trading_bot.rs
mod common;

use std::sync::Arc;
use std::time::Duration;

use auto_futures::domain::errors::TradingError;
use auto_futures::domain::models::{Direction, ExitReason};
use auto_futures::exchange::paper::{JournalEntry, PaperOrderSink};
use auto_futures::trading::AdmissionRejected;
use auto_futures::trading_bot::{SignalRejection, TradingBot};

use common::{
    entry_candles, falling_trend_candles, rising_trend_candles, test_config, CountingEquity, FailingEquity,
    MockMarket,
};

type Bot = TradingBot<Arc<MockMarket>, Arc<CountingEquity>, Arc<PaperOrderSink>>;

const ENTRY: f64 = 105.16;

fn bullish_bot(symbols: &[&str]) -> (Bot, Arc<MockMarket>, Arc<CountingEquity>) {
    let market = Arc::new(MockMarket::new(rising_trend_candles(), entry_candles()));
    for symbol in symbols {
        market.set_price(symbol, ENTRY);
    }
    let equity = Arc::new(CountingEquity::new(10_000.0));
    let bot = TradingBot::new(
        test_config(symbols),
        market.clone(),
        equity.clone(),
        Arc::new(PaperOrderSink::new()),
    );
    (bot, market, equity)
}

#[tokio::test]
async fn cycle_opens_then_closes_at_take_profit() {
    let (mut bot, market, equity) = bullish_bot(&["BTCUSDT"]);

    let report = bot.run_cycle().await;
    assert_eq!(report.signals.len(), 1);
    assert_eq!(report.signals[0].direction, Direction::Long);
    assert_eq!(report.opened.len(), 1);
    assert!(report.closed.is_empty());
    assert_eq!(equity.calls(), 1);
    assert_eq!(bot.positions().open_count(), 1);

    let take_profit = bot.positions().get("BTCUSDT").unwrap().take_profit_price;
    market.set_price("BTCUSDT", take_profit + 0.5);

    let report = bot.run_cycle().await;
    // the repeated signal meets the still-open position before monitoring closes it
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(
        report.rejected[0].reason,
        SignalRejection::Admission(AdmissionRejected::DuplicateInstrument("BTCUSDT".to_string()))
    );
    assert_eq!(report.closed.len(), 1);
    assert_eq!(report.closed[0].reason, ExitReason::TakeProfit);
    assert!(report.closed[0].realized_pnl > 0.0);
    assert_eq!(bot.positions().open_count(), 0);

    let journal = bot.orders().journal().await;
    assert_eq!(journal.len(), 2);
    assert!(matches!(journal[0], JournalEntry::Open { .. }));
    assert!(matches!(&journal[1], JournalEntry::Close { intent, .. } if intent.reason == ExitReason::TakeProfit));
}

#[tokio::test]
async fn third_admission_is_rejected_when_two_are_open() {
    let (mut bot, _market, equity) = bullish_bot(&["BTCUSDT", "ETHUSDT", "SOLUSDT"]);

    let report = bot.run_cycle().await;
    assert_eq!(report.actionable_signals().count(), 3);
    assert_eq!(equity.calls(), 1);

    let opened: Vec<&str> = report.opened.iter().map(|p| p.instrument.as_str()).collect();
    assert_eq!(opened, vec!["BTCUSDT", "ETHUSDT"]);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].signal.instrument, "SOLUSDT");
    assert_eq!(
        report.rejected[0].reason,
        SignalRejection::Admission(AdmissionRejected::CapacityReached { open: 2, max: 2 })
    );
    assert_eq!(bot.positions().open_count(), 2);
}

#[tokio::test]
async fn failing_instrument_does_not_block_others() {
    let market = Arc::new(MockMarket::new(rising_trend_candles(), entry_candles()).failing("ETHUSDT"));
    market.set_price("BTCUSDT", ENTRY);
    let mut bot = TradingBot::new(
        test_config(&["ETHUSDT", "BTCUSDT"]),
        market,
        Arc::new(CountingEquity::new(10_000.0)),
        Arc::new(PaperOrderSink::new()),
    );

    let report = bot.run_cycle().await;
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].instrument, "ETHUSDT");
    assert_eq!(report.opened.len(), 1);
    assert_eq!(report.opened[0].instrument, "BTCUSDT");
}

#[tokio::test]
async fn insufficient_history_skips_instrument() {
    let short_entry = entry_candles()[..120].to_vec();
    let market = Arc::new(MockMarket::new(rising_trend_candles(), short_entry));
    let mut bot = TradingBot::new(
        test_config(&["BTCUSDT"]),
        market,
        Arc::new(CountingEquity::new(10_000.0)),
        Arc::new(PaperOrderSink::new()),
    );

    let report = bot.run_cycle().await;
    assert!(report.signals.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].reason.contains("Insufficient data"));
}

#[tokio::test]
async fn equity_is_not_requested_without_signals() {
    let market = Arc::new(MockMarket::new(falling_trend_candles(), entry_candles()));
    let equity = Arc::new(CountingEquity::new(10_000.0));
    let mut bot = TradingBot::new(
        test_config(&["BTCUSDT", "ETHUSDT"]),
        market,
        equity.clone(),
        Arc::new(PaperOrderSink::new()),
    );

    let report = bot.run_cycle().await;
    assert_eq!(report.signals.len(), 2);
    assert_eq!(report.actionable_signals().count(), 0);
    assert_eq!(equity.calls(), 0);
    assert!(!report.positions_changed());
}

#[tokio::test]
async fn trailing_stop_ratchets_then_exits() {
    let (mut bot, market, _equity) = bullish_bot(&["BTCUSDT"]);
    bot.run_cycle().await;

    market.set_price("BTCUSDT", 106.2);
    let report = bot.run_cycle().await;
    assert_eq!(report.trailing_updates.len(), 1);
    let new_stop = report.trailing_updates[0].new_stop;
    assert!((new_stop - 106.2 * (1.0 - 0.0075)).abs() < 1e-9);
    assert!(report.closed.is_empty());

    market.set_price("BTCUSDT", new_stop - 0.1);
    let report = bot.run_cycle().await;
    assert_eq!(report.closed.len(), 1);
    assert_eq!(report.closed[0].reason, ExitReason::TrailingStop);
}

#[tokio::test]
async fn unavailable_equity_rejects_every_signal() {
    let market = Arc::new(MockMarket::new(rising_trend_candles(), entry_candles()));
    market.set_price("BTCUSDT", ENTRY);
    market.set_price("ETHUSDT", ENTRY);
    let mut bot = TradingBot::new(
        test_config(&["BTCUSDT", "ETHUSDT"]),
        market,
        Arc::new(FailingEquity),
        Arc::new(PaperOrderSink::new()),
    );

    let report = bot.run_cycle().await;
    assert_eq!(report.actionable_signals().count(), 2);
    assert!(report.opened.is_empty());
    assert_eq!(report.rejected.len(), 2);
    for rejected in &report.rejected {
        assert!(matches!(
            &rejected.reason,
            SignalRejection::EquityUnavailable(msg) if msg.contains("account endpoint down")
        ));
    }
    assert_eq!(bot.positions().open_count(), 0);
    assert!(bot.orders().journal().await.is_empty());
}

#[tokio::test]
async fn degenerate_stop_is_rejected_before_admission() {
    let market = Arc::new(MockMarket::new(rising_trend_candles(), entry_candles()));
    market.set_price("BTCUSDT", ENTRY);
    let mut config = test_config(&["BTCUSDT"]);
    // the fixture's stop sits about 2.5 below entry
    config.risk.min_stop_distance = 5.0;
    config.risk.max_concurrent_positions = 1;
    let mut bot = TradingBot::new(
        config,
        market,
        Arc::new(CountingEquity::new(10_000.0)),
        Arc::new(PaperOrderSink::new()),
    );

    let report = bot.run_cycle().await;
    assert_eq!(report.actionable_signals().count(), 1);
    assert!(report.opened.is_empty());
    assert_eq!(report.rejected.len(), 1);
    assert!(matches!(
        report.rejected[0].reason,
        SignalRejection::Sizing(TradingError::DegenerateStop { .. })
    ));
    assert_eq!(bot.positions().open_count(), 0);
    assert!(bot.positions().has_capacity());
    assert!(bot.orders().journal().await.is_empty());
}

#[tokio::test]
async fn shutdown_saves_open_positions() {
    let path = std::env::temp_dir().join(format!("bot-positions-{}.json", std::process::id()));
    let market = Arc::new(MockMarket::new(rising_trend_candles(), entry_candles()));
    market.set_price("BTCUSDT", ENTRY);
    let mut config = test_config(&["BTCUSDT"]);
    config.trading.positions_file = path.to_string_lossy().to_string();

    let mut bot = TradingBot::new(
        config.clone(),
        market.clone(),
        Arc::new(CountingEquity::new(10_000.0)),
        Arc::new(PaperOrderSink::new()),
    );
    bot
        .run_until(tokio::time::sleep(Duration::from_millis(50)))
        .await
        .unwrap();
    assert_eq!(bot.positions().open_count(), 1);

    let mut restored = TradingBot::new(
        config,
        market,
        Arc::new(CountingEquity::new(10_000.0)),
        Arc::new(PaperOrderSink::new()),
    );
    restored.load_positions().unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(restored.positions().instruments(), vec!["BTCUSDT".to_string()]);
}
