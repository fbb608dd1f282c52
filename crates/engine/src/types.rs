//! Types for the backtesting engine

use serde::{de, Deserialize, Deserializer, Serialize};

pub const DEFAULT_RR: f64 = 2.0;
pub const DEFAULT_RISK_PER_TRADE: f64 = 1.0;

/// A single candlestick (OHLC)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// ISO-8601 date or date-time, or `YYYY-MM-DD HH:MM:SS`
    pub time: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Which candle directions may produce a trade
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
    #[default]
    Both,
}

/// `null` and `""` mean `both`, like a missing field
fn direction_or_both<'de, D>(deserializer: D) -> Result<Direction, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(Direction::Both),
        Some("long") => Ok(Direction::Long),
        Some("short") => Ok(Direction::Short),
        Some("both") => Ok(Direction::Both),
        Some(other) => Err(de::Error::unknown_variant(
            other,
            &["long", "short", "both"],
        )),
    }
}

/// Side of a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

/// Time-of-day window in which candles are eligible
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// `HH:MM`
    pub start: String,
    /// `HH:MM`, inclusive
    pub end: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

/// The rule set to test, authored directly or derived from free-text notes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategySpec {
    #[serde(default, deserialize_with = "direction_or_both")]
    pub direction: Direction,
    /// Percent of capital risked per trade. Carried onto each trade as a label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_per_trade: Option<f64>,
    /// Reward-to-risk multiple paid on a win
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rr: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_trades_per_day: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl StrategySpec {
    /// Effective reward-to-risk multiple. Missing, zero or NaN values fall back to 2.
    pub fn effective_rr(&self) -> f64 {
        non_zero(self.rr).unwrap_or(DEFAULT_RR)
    }

    /// Effective risk label. Missing, zero or NaN values fall back to 1.
    pub fn effective_risk_per_trade(&self) -> f64 {
        non_zero(self.risk_per_trade).unwrap_or(DEFAULT_RISK_PER_TRADE)
    }
}

fn non_zero(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0 && !v.is_nan())
}

/// A single simulated decision point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub time: String,
    pub side: Side,
    pub r_multiple: f64,
    pub risk_percent: f64,
}

/// A point on the R equity curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub index: usize,
    pub equity: f64,
}

/// Aggregates over the trade list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_trades: usize,
    /// Percentage in `[0, 100]`
    pub win_rate: f64,
    pub avg_r: f64,
    pub equity_curve: Vec<EquityPoint>,
}

/// Result of a backtest run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub trades: Vec<Trade>,
    pub stats: Stats,
}
