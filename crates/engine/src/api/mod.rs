//! Clients for the external collaborators: market data and the language model

pub mod completion;
pub mod twelvedata;

use async_trait::async_trait;

use crate::types::{Candle, StrategySpec};

pub use completion::{CompletionClient, CompletionClientConfig, CompletionError};
pub use twelvedata::{
    parse_time_series, CandleQuery, MarketDataClientConfig, MarketDataError, TwelveDataClient,
};

/// Source of historical candles
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch_candles(&self, query: &CandleQuery) -> Result<Vec<Candle>, MarketDataError>;
}

/// Turns free-text notes into a structured strategy
#[async_trait]
pub trait StrategyInterpreter: Send + Sync {
    /// Name of the model behind the interpreter, recorded with saved strategies
    fn model_name(&self) -> &str;

    async fn interpret(&self, notes: &str) -> Result<StrategySpec, CompletionError>;
}
