// src/trading_bot.rs
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;

use crate::analysis::indicators::IndicatorSnapshot;
use crate::analysis::trend::classify_trend;
use crate::config::Config;
use crate::domain::errors::{AnalysisError, AppError, AppResult, TradingError};
use crate::domain::models::{Signal, Timeframe};
use crate::exchange::client::{AccountSource, MarketDataSource, OrderSink};
use crate::trading::positions::{
    AdmissionOutcome, AdmissionRejected, ClosedPosition, MonitorOutcome, Position, PositionManager,
    TrailingUpdate,
};
use crate::trading::risk::RiskSizer;
use crate::trading::signals::SignalEvaluator;

/// Instrument left out of a cycle, with the reason
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedInstrument {
    pub instrument: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignalRejection {
    EquityUnavailable(String),
    Sizing(TradingError),
    Admission(AdmissionRejected),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedSignal {
    pub signal: Signal,
    pub reason: SignalRejection,
}

/// Everything one evaluation pass decided
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub signals: Vec<Signal>,
    pub opened: Vec<Position>,
    pub rejected: Vec<RejectedSignal>,
    pub closed: Vec<ClosedPosition>,
    pub trailing_updates: Vec<TrailingUpdate>,
    pub skipped: Vec<SkippedInstrument>,
}

impl CycleReport {
    pub fn actionable_signals(&self) -> impl Iterator<Item = &Signal> {
        self.signals.iter().filter(|s| s.is_actionable())
    }

    /// True when the open set or a stop changed during the cycle
    pub fn positions_changed(&self) -> bool {
        !self.opened.is_empty() || !self.closed.is_empty() || !self.trailing_updates.is_empty()
    }
}

/// Drives the evaluation chain once per tick over the configured instruments.
pub struct TradingBot<M, A, O>
where
    M: MarketDataSource,
    A: AccountSource,
    O: OrderSink,
{
    config: Config,
    market: M,
    account: A,
    orders: O,
    evaluator: SignalEvaluator,
    sizer: RiskSizer,
    positions: PositionManager,
}

impl<M, A, O> TradingBot<M, A, O>
where
    M: MarketDataSource,
    A: AccountSource,
    O: OrderSink,
{
    pub fn new(config: Config, market: M, account: A, orders: O) -> Self {
        let evaluator = SignalEvaluator::new(config.strategy.thresholds.clone());
        let sizer = RiskSizer::new(config.risk.clone());
        let positions = PositionManager::new(config.risk.clone());

        Self {
            config,
            market,
            account,
            orders,
            evaluator,
            sizer,
            positions,
        }
    }

    pub fn positions(&self) -> &PositionManager {
        &self.positions
    }

    pub fn orders(&self) -> &O {
        &self.orders
    }

    fn snapshot_path(&self) -> Option<PathBuf> {
        let file = self.config.trading.positions_file.trim();
        if file.is_empty() {
            None
        } else {
            Some(PathBuf::from(file))
        }
    }

    /// Restores open positions from the snapshot file, if one is configured.
    pub fn load_positions(&mut self) -> AppResult<()> {
        if let Some(path) = self.snapshot_path() {
            self.positions = PositionManager::load(self.config.risk.clone(), path)?;
        }
        Ok(())
    }

    pub fn save_positions(&self) -> AppResult<()> {
        if let Some(path) = self.snapshot_path() {
            self.positions.save(&path)?;
            log::debug!("Saved {} open positions to {}", self.positions.open_count(), path.display());
        }
        Ok(())
    }

    /// Runs cycles until Ctrl-C or SIGTERM.
    pub async fn run(&mut self) -> AppResult<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Runs one cycle per tick until `shutdown` resolves, then saves the
    /// open positions. A cycle in progress is always completed.
    pub async fn run_until<F>(&mut self, shutdown: F) -> AppResult<()>
    where
        F: Future<Output = ()>,
    {
        let period = Duration::from_secs(self.config.trading.cycle_interval_secs.max(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        log::info!(
            "Trading bot started: {} instruments, trend {} / entry {}, every {:?}",
            self.config.trading.symbols.len(),
            self.config.trading.trend_interval,
            self.config.trading.entry_interval,
            period
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    log::info!("Shutdown requested, stopping after the current cycle");
                    break;
                }
                _ = interval.tick() => {
                    let report = self.run_cycle().await;
                    let summary = self.positions.summary();
                    log::info!(
                        "Cycle done: {} signals, {} opened, {} rejected, {} closed, {} trailing, {} skipped | open {} (unrealized {:.4})",
                        report.actionable_signals().count(),
                        report.opened.len(),
                        report.rejected.len(),
                        report.closed.len(),
                        report.trailing_updates.len(),
                        report.skipped.len(),
                        summary.open,
                        summary.unrealized_pnl
                    );
                }
            }
        }

        self.save_positions()?;
        log::info!("Trading bot stopped with {} open positions", self.positions.open_count());
        Ok(())
    }

    /// One evaluation pass: signals for every instrument first, then sizing
    /// and admission, then monitoring of open positions.
    pub async fn run_cycle(&mut self) -> CycleReport {
        log::debug!("Cycle started at {}", Utc::now());
        let mut report = CycleReport::default();

        for symbol in self.config.trading.symbols.clone() {
            match self.evaluate_instrument(&symbol).await {
                Ok(signal) => report.signals.push(signal),
                Err(e) => {
                    match &e {
                        AppError::Exchange(_) => log::error!("Skipping {}: {}", symbol, e),
                        _ => log::warn!("Skipping {}: {}", symbol, e),
                    }
                    report.skipped.push(SkippedInstrument {
                        instrument: symbol,
                        reason: e.to_string(),
                    });
                }
            }
        }

        self.admit_signals(&mut report).await;
        self.monitor_positions(&mut report).await;

        if report.positions_changed() {
            if let Err(e) = self.save_positions() {
                log::error!("Failed to save positions: {}", e);
            }
        }

        log::debug!("Cycle finished at {}", Utc::now());
        report
    }

    async fn snapshot_for(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> AppResult<IndicatorSnapshot> {
        let candles = self
            .market
            .get_candles(symbol, timeframe, self.config.trading.candle_count)
            .await?;
        Ok(IndicatorSnapshot::compute(&candles, &self.config.strategy.indicators)?)
    }

    /// Trend bias from the higher timeframe, entry decision from the lower one.
    pub async fn evaluate_instrument(&self, symbol: &str) -> AppResult<Signal> {
        let trend = self.snapshot_for(symbol, self.config.trading.trend_interval).await?;
        let bias = classify_trend(&trend);

        let entry = self.snapshot_for(symbol, self.config.trading.entry_interval).await?;
        let latest_close = entry.latest_close().ok_or(AnalysisError::InsufficientData {
            indicator: "close",
            required: 1,
            actual: 0,
        })?;

        log::debug!("{}: trend {} on {}, close {:.4}", symbol, bias, self.config.trading.trend_interval, latest_close);
        Ok(self.evaluator.evaluate(symbol, &entry, latest_close, bias))
    }

    async fn admit_signals(&mut self, report: &mut CycleReport) {
        let actionable: Vec<Signal> = report.actionable_signals().cloned().collect();
        if actionable.is_empty() {
            return;
        }

        let equity = match self.account.get_equity().await {
            Ok(equity) => equity,
            Err(e) => {
                log::error!("Equity unavailable, dropping {} signals: {}", actionable.len(), e);
                report.rejected.extend(actionable.into_iter().map(|signal| RejectedSignal {
                    signal,
                    reason: SignalRejection::EquityUnavailable(e.to_string()),
                }));
                return;
            }
        };

        for signal in actionable {
            let trade = match self.sizer.size_signal(&signal, equity) {
                Ok(trade) => trade,
                Err(e) => {
                    log::warn!("Rejected {} signal for {}: {}", signal.direction, signal.instrument, e);
                    report.rejected.push(RejectedSignal {
                        signal,
                        reason: SignalRejection::Sizing(e),
                    });
                    continue;
                }
            };

            match self.positions.admit(Position::pending(&trade, Utc::now())) {
                AdmissionOutcome::Opened(position) => {
                    match self.orders.open(&position.open_intent()).await {
                        Ok(receipt) => log::info!("Open order accepted: {:?}", receipt),
                        Err(e) => log::error!("Open order for {} failed: {}", position.instrument, e),
                    }
                    report.opened.push(position);
                }
                AdmissionOutcome::Rejected(reason) => {
                    report.rejected.push(RejectedSignal {
                        signal,
                        reason: SignalRejection::Admission(reason),
                    });
                }
            }
        }
    }

    async fn monitor_positions(&mut self, report: &mut CycleReport) {
        for instrument in self.positions.instruments() {
            let price = match self.market.get_price(&instrument).await {
                Ok(price) => price,
                Err(e) => {
                    log::error!("No price for open position {}: {}", instrument, e);
                    continue;
                }
            };

            match self.positions.monitor(&instrument, price) {
                Some(MonitorOutcome::Closed(closed)) => {
                    match self.orders.close(&closed.close_intent()).await {
                        Ok(receipt) => log::info!("Close order accepted: {:?}", receipt),
                        Err(e) => log::error!("Close order for {} failed: {}", instrument, e),
                    }
                    report.closed.push(closed);
                }
                Some(MonitorOutcome::TrailingAdvanced(update)) => report.trailing_updates.push(update),
                Some(MonitorOutcome::Held) | None => {}
            }
        }
    }
}

/// Resolves on Ctrl-C, or on SIGTERM where the platform has it.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("Received Ctrl-C"),
        _ = terminate => log::info!("Received SIGTERM"),
    }
}
