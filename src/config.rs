// src/config.rs
use crate::analysis::indicators::IndicatorSettings;
use crate::domain::errors::{AppError, AppResult};
use crate::domain::models::Timeframe;
use crate::exchange::binance::MAX_KLINES_PER_REQUEST;
use crate::trading::risk::RiskParameters;
use crate::trading::signals::SignalThresholds;
use dotenv::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Trading bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Exchange API credentials
    pub exchange: ExchangeConfig,

    /// Instruments, timeframes and scheduling
    pub trading: TradingConfig,

    /// Indicator periods and signal thresholds
    pub strategy: StrategyConfig,

    /// Risk management configuration
    pub risk: RiskParameters,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Exchange API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// API key, absent for paper trading
    pub api_key: Option<String>,

    /// API secret, absent for paper trading
    pub api_secret: Option<String>,

    /// Asset account equity is measured in (e.g., "USDT")
    pub quote_asset: String,
}

impl ExchangeConfig {
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.api_key.as_deref(), self.api_secret.as_deref()) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => Some((key, secret)),
            _ => None,
        }
    }
}

/// Trading configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Trading symbols, evaluated in this order every cycle
    pub symbols: Vec<String>,

    /// Higher timeframe used for the trend bias
    pub trend_interval: Timeframe,

    /// Lower timeframe used for entries
    pub entry_interval: Timeframe,

    /// Candles requested per timeframe
    pub candle_count: usize,

    /// Seconds between two evaluation cycles
    pub cycle_interval_secs: u64,

    /// Send live orders
    pub auto_trading: bool,

    /// Decimal places kept on order quantities
    pub quantity_precision: u32,

    /// Equity used when no account source is available
    pub paper_equity: f64,

    /// Open-position snapshot file
    pub positions_file: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub indicators: IndicatorSettings,
    pub thresholds: SignalThresholds,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "warn", "error")
    pub level: String,

    /// Log to file
    pub to_file: bool,

    /// Log file path
    pub file_path: Option<String>,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

fn env_timeframe(key: &str, default: Timeframe) -> AppResult<Timeframe> {
    match env::var(key) {
        Ok(value) => value
            .parse()
            .map_err(|e| AppError::Config(format!("{}: {}", key, e))),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let defaults = Config::default();

        let exchange_config = ExchangeConfig {
            api_key: env::var("BINANCE_API_KEY").ok().filter(|s| !s.is_empty()),
            api_secret: env::var("BINANCE_API_SECRET").ok().filter(|s| !s.is_empty()),
            quote_asset: env::var("QUOTE_ASSET").unwrap_or(defaults.exchange.quote_asset),
        };

        let symbols = match env::var("TRADING_SYMBOLS") {
            Ok(list) => list
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
            Err(_) => defaults.trading.symbols,
        };

        let trading_config = TradingConfig {
            symbols,
            trend_interval: env_timeframe("TREND_INTERVAL", defaults.trading.trend_interval)?,
            entry_interval: env_timeframe("ENTRY_INTERVAL", defaults.trading.entry_interval)?,
            candle_count: env_or("CANDLE_COUNT", defaults.trading.candle_count),
            cycle_interval_secs: env_or("BOT_RUN_INTERVAL", defaults.trading.cycle_interval_secs),
            auto_trading: env_or("AUTO_TRADING", defaults.trading.auto_trading),
            quantity_precision: env_or("QUANTITY_PRECISION", defaults.trading.quantity_precision),
            paper_equity: env_or("PAPER_EQUITY", defaults.trading.paper_equity),
            positions_file: env::var("POSITIONS_FILE").unwrap_or(defaults.trading.positions_file),
        };

        let indicators = defaults.strategy.indicators;
        let thresholds = defaults.strategy.thresholds;
        let strategy_config = StrategyConfig {
            indicators: IndicatorSettings {
                ema_fast_period: env_or("EMA_FAST_PERIOD", indicators.ema_fast_period),
                ema_slow_period: env_or("EMA_SLOW_PERIOD", indicators.ema_slow_period),
                rsi_period: env_or("RSI_PERIOD", indicators.rsi_period),
                macd_fast_period: env_or("MACD_FAST_PERIOD", indicators.macd_fast_period),
                macd_slow_period: env_or("MACD_SLOW_PERIOD", indicators.macd_slow_period),
                macd_signal_period: env_or("MACD_SIGNAL_PERIOD", indicators.macd_signal_period),
            },
            thresholds: SignalThresholds {
                rsi_oversold: env_or("RSI_OVERSOLD", thresholds.rsi_oversold),
                rsi_mid: env_or("RSI_MID_LEVEL", thresholds.rsi_mid),
                rsi_overbought: env_or("RSI_OVERBOUGHT", thresholds.rsi_overbought),
            },
        };

        let risk = defaults.risk;
        let risk_config = RiskParameters {
            max_risk_per_trade: env_or("MAX_RISK_PER_TRADE", risk.max_risk_per_trade),
            max_concurrent_positions: env_or("MAX_CONCURRENT_TRADES", risk.max_concurrent_positions),
            risk_reward_ratio: env_or("RISK_REWARD_RATIO", risk.risk_reward_ratio),
            trailing_activation_pct: env_or("TRAILING_STOP_PERCENT", risk.trailing_activation_pct),
            trailing_offset_pct: env_or("TRAILING_OFFSET_PERCENT", risk.trailing_offset_pct),
            min_stop_distance: env_or("MIN_STOP_DISTANCE", risk.min_stop_distance),
            max_position_notional_pct: env::var("MAX_POSITION_NOTIONAL_PCT")
                .ok()
                .and_then(|v| v.trim().parse().ok()),
            min_order_notional: env_or("MIN_ORDER_NOTIONAL", risk.min_order_notional),
        };

        let logging_config = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or(defaults.logging.level),
            to_file: env_or("LOG_TO_FILE", defaults.logging.to_file),
            file_path: env::var("LOG_FILE_PATH").ok().or(defaults.logging.file_path),
        };

        let config = Config {
            exchange: exchange_config,
            trading: trading_config,
            strategy: strategy_config,
            risk: risk_config,
            logging: logging_config,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let mut file = File::open(path).map_err(|e| {
            AppError::Config(format!("Failed to open config file: {}", e))
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).map_err(|e| {
            AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        let config: Config = serde_json::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> AppResult<()> {
        let contents = serde_json::to_string_pretty(self).map_err(|e| {
            AppError::Config(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(path, contents).map_err(|e| {
            AppError::Config(format!("Failed to write config file: {}", e))
        })?;

        Ok(())
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> AppResult<()> {
        if self.trading.symbols.is_empty() {
            return Err(AppError::Config("No trading symbols configured".to_string()));
        }
        if self.trading.cycle_interval_secs == 0 {
            return Err(AppError::Config("Cycle interval must be at least one second".to_string()));
        }

        self.strategy
            .indicators
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let lookback = self.strategy.indicators.lookback();
        if lookback > MAX_KLINES_PER_REQUEST {
            return Err(AppError::Config(format!(
                "Indicator lookback {} exceeds the {} candles one request can return",
                lookback, MAX_KLINES_PER_REQUEST
            )));
        }
        if self.trading.candle_count > MAX_KLINES_PER_REQUEST {
            return Err(AppError::Config(format!(
                "candle_count {} exceeds the {} candles one request can return",
                self.trading.candle_count, MAX_KLINES_PER_REQUEST
            )));
        }
        if self.trading.candle_count < lookback {
            return Err(AppError::Config(format!(
                "candle_count {} is below the indicator lookback {}",
                self.trading.candle_count, lookback
            )));
        }

        let t = &self.strategy.thresholds;
        if !(0.0 <= t.rsi_oversold && t.rsi_oversold <= t.rsi_mid && t.rsi_mid <= t.rsi_overbought && t.rsi_overbought <= 100.0) {
            return Err(AppError::Config(format!(
                "RSI thresholds must satisfy 0 <= oversold <= mid <= overbought <= 100 (got {}/{}/{})",
                t.rsi_oversold, t.rsi_mid, t.rsi_overbought
            )));
        }

        let r = &self.risk;
        if !(r.max_risk_per_trade > 0.0 && r.max_risk_per_trade <= 1.0) {
            return Err(AppError::Config(format!(
                "max_risk_per_trade must be in (0, 1], got {}",
                r.max_risk_per_trade
            )));
        }
        if r.max_concurrent_positions == 0 {
            return Err(AppError::Config("max_concurrent_positions must be at least 1".to_string()));
        }
        if !(r.risk_reward_ratio > 0.0) {
            return Err(AppError::Config("risk_reward_ratio must be positive".to_string()));
        }
        if !(r.trailing_activation_pct >= 0.0) || !(r.trailing_offset_pct > 0.0 && r.trailing_offset_pct < 1.0) {
            return Err(AppError::Config(format!(
                "Invalid trailing settings: activation {}, offset {}",
                r.trailing_activation_pct, r.trailing_offset_pct
            )));
        }
        if let Some(pct) = r.max_position_notional_pct {
            if !(pct > 0.0) {
                return Err(AppError::Config("max_position_notional_pct must be positive".to_string()));
            }
        }

        Ok(())
    }

    /// Initialize logging based on configuration
    pub fn init_logging(&self) -> AppResult<()> {
        let mut builder = env_logger::Builder::new();

        // Set log level
        let log_level = match self.logging.level.to_lowercase().as_str() {
            "trace" => log::LevelFilter::Trace,
            "debug" => log::LevelFilter::Debug,
            "info" => log::LevelFilter::Info,
            "warn" => log::LevelFilter::Warn,
            "error" => log::LevelFilter::Error,
            _ => log::LevelFilter::Info,
        };

        builder.filter_level(log_level);

        // Configure output
        if self.logging.to_file {
            if let Some(file_path) = &self.logging.file_path {
                let file = File::create(file_path).map_err(|e| {
                    AppError::Config(format!("Failed to create log file: {}", e))
                })?;

                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
        }

        builder.try_init().map_err(|e| AppError::Config(format!("Failed to initialize logger: {}", e)))?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exchange: ExchangeConfig {
                api_key: None,
                api_secret: None,
                quote_asset: "USDT".to_string(),
            },
            trading: TradingConfig {
                symbols: ["BTCUSDT", "ETHUSDT", "SOLUSDT", "BNBUSDT", "XRPUSDT"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                trend_interval: Timeframe::Hours4,
                entry_interval: Timeframe::Minutes15,
                candle_count: 500,
                cycle_interval_secs: 60,
                auto_trading: false,
                quantity_precision: 3,
                paper_equity: 10_000.0,
                positions_file: "positions.json".to_string(),
            },
            strategy: StrategyConfig::default(),
            risk: RiskParameters::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                to_file: false,
                file_path: Some("trading_bot.log".to_string()),
            },
        }
    }
}
