//! Strategies repository: interpreted or hand-written strategy specifications

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::{FromRow, SqlitePool};

/// A persisted strategy
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StrategyRecord {
    pub id: i64,
    pub spec_hash: String,
    pub direction: String,
    pub rr: f64,
    pub risk_per_trade: f64,
    pub timeframe: Option<String>,
    pub spec_json: String,
    /// Free-text notes the strategy was interpreted from
    pub source_notes: Option<String>,
    /// Language model that produced the strategy, if any
    pub model: Option<String>,
    pub created_at: Option<i64>,
}

/// A strategy to store
#[derive(Debug, Clone)]
pub struct NewStrategy {
    pub direction: String,
    pub rr: f64,
    pub risk_per_trade: f64,
    pub timeframe: Option<String>,
    /// Canonical JSON of the specification; identical JSON dedupes to one row
    pub spec_json: String,
    pub source_notes: Option<String>,
    pub model: Option<String>,
}

/// Deduplication hash for a strategy's canonical JSON
pub fn compute_spec_hash(spec_json: &str) -> String {
    format!("{:x}", Sha256::digest(spec_json.as_bytes()))
}

/// Repository for strategies
pub struct StrategyRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> StrategyRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a strategy, or return the existing row with the same JSON.
    /// Notes and model are filled in on an existing row when it lacks them.
    pub async fn save(&self, strategy: &NewStrategy) -> DbResult<i64> {
        let hash = compute_spec_hash(&strategy.spec_json);

        let (id,): (i64,) = sqlx::query_as(
            r#"INSERT INTO strategies
                (spec_hash, direction, rr, risk_per_trade, timeframe, spec_json, source_notes, model)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
               ON CONFLICT(spec_hash) DO UPDATE SET
                 source_notes = COALESCE(strategies.source_notes, excluded.source_notes),
                 model = COALESCE(strategies.model, excluded.model)
               RETURNING id
            "#,
        )
        .bind(&hash)
        .bind(&strategy.direction)
        .bind(strategy.rr)
        .bind(strategy.risk_per_trade)
        .bind(&strategy.timeframe)
        .bind(&strategy.spec_json)
        .bind(&strategy.source_notes)
        .bind(&strategy.model)
        .fetch_one(self.pool)
        .await?;

        Ok(id)
    }

    pub async fn get(&self, id: i64) -> DbResult<Option<StrategyRecord>> {
        let record =
            sqlx::query_as::<_, StrategyRecord>("SELECT * FROM strategies WHERE id = ?1")
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        Ok(record)
    }

    /// Most recent strategies first
    pub async fn list_recent(&self, limit: i64) -> DbResult<Vec<StrategyRecord>> {
        let records = sqlx::query_as::<_, StrategyRecord>(
            "SELECT * FROM strategies ORDER BY created_at DESC, id DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }
}
