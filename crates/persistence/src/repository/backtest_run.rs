//! Backtest runs repository: results of backtests against market data

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// A persisted backtest run
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BacktestRunRecord {
    pub id: Option<i64>,
    pub strategy_id: Option<i64>,
    pub symbol: String,
    pub interval: String,
    pub from_date: String,
    pub to_date: String,
    pub candle_count: i64,
    pub total_trades: i64,
    pub win_rate: f64,
    pub avg_r: f64,
    pub total_r: f64,
    pub profit_factor: f64,
    pub max_drawdown: f64,
    /// Full response body (trades, stats, summary) as served
    pub result_json: String,
    pub created_at: Option<i64>,
}

/// Repository for backtest runs
pub struct BacktestRunRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> BacktestRunRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Save a run; `id` and `created_at` on the record are ignored
    pub async fn save(&self, run: &BacktestRunRecord) -> DbResult<i64> {
        let result = sqlx::query(
            r#"INSERT INTO backtest_runs
                (strategy_id, symbol, interval, from_date, to_date, candle_count,
                 total_trades, win_rate, avg_r, total_r, profit_factor, max_drawdown,
                 result_json)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(run.strategy_id)
        .bind(&run.symbol)
        .bind(&run.interval)
        .bind(&run.from_date)
        .bind(&run.to_date)
        .bind(run.candle_count)
        .bind(run.total_trades)
        .bind(run.win_rate)
        .bind(run.avg_r)
        .bind(run.total_r)
        .bind(run.profit_factor)
        .bind(run.max_drawdown)
        .bind(&run.result_json)
        .execute(self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> DbResult<Option<BacktestRunRecord>> {
        let record =
            sqlx::query_as::<_, BacktestRunRecord>("SELECT * FROM backtest_runs WHERE id = ?1")
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        Ok(record)
    }

    /// Most recent runs first
    pub async fn list_recent(&self, limit: i64) -> DbResult<Vec<BacktestRunRecord>> {
        let records = sqlx::query_as::<_, BacktestRunRecord>(
            "SELECT * FROM backtest_runs ORDER BY created_at DESC, id DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    /// All runs of one strategy, most recent first
    pub async fn list_for_strategy(&self, strategy_id: i64) -> DbResult<Vec<BacktestRunRecord>> {
        let records = sqlx::query_as::<_, BacktestRunRecord>(
            r#"SELECT * FROM backtest_runs
               WHERE strategy_id = ?1
               ORDER BY created_at DESC, id DESC"#,
        )
        .bind(strategy_id)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }
}
