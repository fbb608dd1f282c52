//! Database schema definitions

/// SQL to create all tables
/// NOTE: strategy and result payloads are stored as JSON TEXT exactly as served
pub const CREATE_TABLES: &str = r#"
-- Strategies, deduplicated by a hash of their canonical JSON
CREATE TABLE IF NOT EXISTS strategies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    spec_hash TEXT NOT NULL UNIQUE,
    direction TEXT NOT NULL,
    rr REAL NOT NULL,
    risk_per_trade REAL NOT NULL,
    timeframe TEXT,
    spec_json TEXT NOT NULL,
    source_notes TEXT,
    model TEXT,
    created_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- Backtest runs against market data
CREATE TABLE IF NOT EXISTS backtest_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    strategy_id INTEGER REFERENCES strategies(id) ON DELETE SET NULL,
    symbol TEXT NOT NULL,
    interval TEXT NOT NULL,
    from_date TEXT NOT NULL,
    to_date TEXT NOT NULL,
    candle_count INTEGER NOT NULL DEFAULT 0,
    total_trades INTEGER NOT NULL DEFAULT 0,
    win_rate REAL NOT NULL DEFAULT 0,
    avg_r REAL NOT NULL DEFAULT 0,
    total_r REAL NOT NULL DEFAULT 0,
    profit_factor REAL NOT NULL DEFAULT 0,
    max_drawdown REAL NOT NULL DEFAULT 0,
    result_json TEXT NOT NULL,
    created_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- ========== INDEXES ==========

CREATE INDEX IF NOT EXISTS idx_strategies_created ON strategies(created_at DESC);
CREATE INDEX IF NOT EXISTS idx_runs_strategy ON backtest_runs(strategy_id);
CREATE INDEX IF NOT EXISTS idx_runs_symbol ON backtest_runs(symbol, interval);
CREATE INDEX IF NOT EXISTS idx_runs_created ON backtest_runs(created_at DESC)
"#;

/// Additive column migrations, applied after `CREATE_TABLES`.
/// "duplicate column name" failures are expected on later runs.
pub const MIGRATIONS: &[&str] = &[];
