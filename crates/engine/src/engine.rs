//! Candle-direction backtesting engine

use tracing::{debug, info};

use crate::session::in_session;
use crate::types::*;

/// Backtesting engine that turns every eligible directional candle into a trade
pub struct BacktestEngine;

impl BacktestEngine {
    /// Run a backtest on the given candles with the specified strategy.
    ///
    /// Candles must be in ascending time order. The first candle never
    /// produces a trade. This never fails: an empty or single-candle series
    /// yields an empty result.
    pub fn run(spec: &StrategySpec, candles: &[Candle]) -> BacktestResult {
        let rr = spec.effective_rr();
        let risk = spec.effective_risk_per_trade();

        debug!(
            bars = candles.len(),
            direction = ?spec.direction,
            rr,
            session = spec.session.is_some(),
            "Starting backtest"
        );

        let mut trades: Vec<Trade> = Vec::new();
        let mut equity_curve: Vec<EquityPoint> = Vec::new();
        let mut wins = 0usize;
        let mut equity = 0.0;

        for candle in candles.iter().skip(1) {
            if !in_session(&candle.time, spec.session.as_ref()) {
                continue;
            }

            let is_bull = candle.close > candle.open;
            let is_bear = candle.close < candle.open;

            let Some(side) = Self::select_side(spec.direction, is_bull, is_bear) else {
                continue;
            };

            let r = match side {
                Side::Long if is_bull => 1.0,
                Side::Short if is_bear => 1.0,
                _ => -1.0,
            };
            let r_multiple = r * rr;

            if r_multiple > 0.0 {
                wins += 1;
            }
            equity += r_multiple;
            equity_curve.push(EquityPoint {
                index: trades.len(),
                equity,
            });

            trades.push(Trade {
                time: candle.time.clone(),
                side,
                r_multiple,
                risk_percent: risk,
            });
        }

        let total_trades = trades.len();
        let (win_rate, avg_r) = if total_trades > 0 {
            (
                wins as f64 / total_trades as f64 * 100.0,
                equity / total_trades as f64,
            )
        } else {
            (0.0, 0.0)
        };

        info!(total_trades, wins, win_rate, avg_r, "Backtest complete");

        BacktestResult {
            trades,
            stats: Stats {
                total_trades,
                win_rate,
                avg_r,
                equity_curve,
            },
        }
    }

    fn select_side(direction: Direction, is_bull: bool, is_bear: bool) -> Option<Side> {
        match direction {
            Direction::Long if is_bull => Some(Side::Long),
            Direction::Short if is_bear => Some(Side::Short),
            Direction::Both if is_bull => Some(Side::Long),
            Direction::Both if is_bear => Some(Side::Short),
            _ => None,
        }
    }
}
