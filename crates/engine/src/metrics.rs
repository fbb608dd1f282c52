//! Performance summary over a trade list
//!
//! Adds the figures the results view shows next to the engine stats:
//! win/loss counts, total R, profit factor and max drawdown of the R equity
//! curve (equity starts at 0R).

use serde::{Deserialize, Serialize};

use crate::types::Trade;

/// Profit factor reported when there are wins but no losses
pub const PROFIT_FACTOR_CAP: f64 = 999.99;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub total_r: f64,
    pub avg_r: f64,
    pub profit_factor: f64,
    /// Largest peak-to-trough decline in R, reported as a value `<= 0`
    pub max_drawdown: f64,
}

/// Summarize a trade list
pub fn summarize(trades: &[Trade]) -> PerformanceSummary {
    if trades.is_empty() {
        return PerformanceSummary::default();
    }

    let mut wins = 0usize;
    let mut losses = 0usize;
    let mut gross_profit = 0.0;
    let mut gross_loss = 0.0;
    let mut equity: f64 = 0.0;
    let mut peak: f64 = 0.0;
    let mut max_drawdown: f64 = 0.0;

    for trade in trades {
        let r = trade.r_multiple;
        if r > 0.0 {
            wins += 1;
            gross_profit += r;
        } else if r < 0.0 {
            losses += 1;
            gross_loss += r.abs();
        }

        equity += r;
        peak = peak.max(equity);
        max_drawdown = max_drawdown.max(peak - equity);
    }

    let n = trades.len() as f64;
    let profit_factor = if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else if gross_profit > 0.0 {
        PROFIT_FACTOR_CAP
    } else {
        0.0
    };

    PerformanceSummary {
        trades: trades.len(),
        wins,
        losses,
        win_rate: wins as f64 / n * 100.0,
        total_r: equity,
        avg_r: equity / n,
        profit_factor,
        max_drawdown: -max_drawdown,
    }
}
