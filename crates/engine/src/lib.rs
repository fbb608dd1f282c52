//! Strategy Analyzer Engine: candle backtests and their collaborators
//!
//! Provides:
//! - The candle-direction backtesting engine and its performance summary
//! - Session (time-of-day) filtering
//! - TwelveData client for historical candles
//! - Chat completion client that interprets free-text strategy notes

pub mod api;
pub mod engine;
pub mod interpret;
pub mod metrics;
pub mod session;
pub mod types;

// Re-exports for convenience
pub use api::{
    CandleQuery, CompletionClient, CompletionClientConfig, CompletionError, MarketDataClientConfig,
    MarketDataError, MarketDataSource, StrategyInterpreter, TwelveDataClient,
};
pub use engine::BacktestEngine;
pub use interpret::{parse_model_output, ModelOutputFormatError};
pub use metrics::{summarize, PerformanceSummary};
pub use types::*;

/// Run a backtest over `candles` with `spec`
pub fn run_backtest(candles: &[Candle], spec: &StrategySpec) -> BacktestResult {
    BacktestEngine::run(spec, candles)
}
