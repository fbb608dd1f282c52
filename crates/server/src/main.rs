//! Strategy Analyzer: backtest free-text trading strategies against market data
//!
//! Usage:
//!   strategy-analyzer serve --port 3002                              - Launch web server
//!   strategy-analyzer backtest --candles c.json --strategy s.json    - Backtest local files
//!   strategy-analyzer interpret --notes "London open, 3R, longs"     - Interpret notes

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use clap::{Parser, Subcommand};
use engine::{
    run_backtest, summarize, Candle, CandleQuery, CompletionClient, CompletionClientConfig,
    MarketDataClientConfig, MarketDataError, MarketDataSource, StrategyInterpreter, StrategySpec,
    TwelveDataClient,
};
use persistence::repository::{
    BacktestRunRecord, BacktestRunRepository, NewStrategy, StrategyRecord, StrategyRepository,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

const APP_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-", env!("GIT_HASH"));
const DEFAULT_INTERVAL: &str = "1h";
const SUPPORTED_INTERVALS: &[&str] = &["15min", "1h", "4h", "1day"];

#[derive(Parser)]
#[command(name = "strategy-analyzer")]
#[command(about = "Backtest free-text trading strategies against market data", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the web server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value_t = 3002)]
        port: u16,
    },
    /// Backtest a strategy against a local candle file (no network)
    Backtest {
        /// JSON array of {time, open, high, low, close}
        #[arg(long)]
        candles: String,
        /// JSON strategy specification
        #[arg(long)]
        strategy: String,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interpret free-text strategy notes with the language model
    Interpret {
        #[arg(long)]
        notes: String,
    },
}

#[derive(Clone)]
struct AppState {
    market_data: Arc<dyn MarketDataSource>,
    interpreter: Arc<dyn StrategyInterpreter>,
    db: Arc<persistence::Database>,
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,engine=debug,persistence=debug,strategy_analyzer=debug,sqlx=warn")
    } else {
        EnvFilter::new("info,engine=info,strategy_analyzer=info,sqlx=warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

fn market_data_config() -> MarketDataClientConfig {
    let defaults = MarketDataClientConfig::default();
    MarketDataClientConfig {
        api_key: std::env::var("TWELVEDATA_API_KEY").unwrap_or_default(),
        base_url: std::env::var("TWELVEDATA_BASE_URL").unwrap_or(defaults.base_url.clone()),
        ..defaults
    }
}

fn completion_config() -> CompletionClientConfig {
    let defaults = CompletionClientConfig::default();
    CompletionClientConfig {
        api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
        model: std::env::var("OPENAI_MODEL").unwrap_or(defaults.model.clone()),
        base_url: std::env::var("OPENAI_BASE_URL").unwrap_or(defaults.base_url.clone()),
        ..defaults
    }
}

fn db_path() -> String {
    std::env::var("STRATEGY_ANALYZER_DB_PATH").unwrap_or_else(|_| "data/analyzer.db".to_string())
}

/// Market-data interval for a strategy timeframe; unknown or missing maps to `1h`
fn interval_for(timeframe: Option<&str>) -> &'static str {
    timeframe
        .and_then(|tf| SUPPORTED_INTERVALS.iter().find(|i| **i == tf).copied())
        .unwrap_or(DEFAULT_INTERVAL)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Serve { host, port } => {
            cmd_serve(&host, port).await?;
        }
        Commands::Backtest {
            candles,
            strategy,
            json,
        } => {
            cmd_backtest(&candles, &strategy, json)?;
        }
        Commands::Interpret { notes } => {
            cmd_interpret(&notes).await?;
        }
    }

    Ok(())
}

// ============================================================================
// Serve command: Axum web server
// ============================================================================

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api_health))
        .route("/interpret", post(api_interpret))
        .route("/backtest", post(api_backtest))
        .route("/backtest/candles", post(api_backtest_candles))
        .route("/market/candles", get(api_market_candles))
        .route("/runs", get(api_list_runs))
        .route("/runs/:id", get(api_get_run))
        .route("/strategies", get(api_list_strategies))
        .with_state(state)
}

async fn cmd_serve(host: &str, port: u16) -> anyhow::Result<()> {
    info!("Strategy Analyzer v{} starting...", APP_VERSION);

    let db_path = db_path();
    let db = persistence::Database::new(&db_path).await.map_err(|e| {
        error!("Failed to initialize database: {}", e);
        anyhow::anyhow!("Database initialization failed: {}", e)
    })?;
    info!("Database initialized: {}", db_path);

    let market_config = market_data_config();
    let completion_config = completion_config();
    if market_config.api_key.is_empty() {
        warn!("TWELVEDATA_API_KEY is not set; /api/backtest will fail");
    }
    if completion_config.api_key.is_empty() {
        warn!("OPENAI_API_KEY is not set; /api/interpret will fail");
    }

    let state = AppState {
        market_data: Arc::new(TwelveDataClient::new(market_config)?),
        interpreter: Arc::new(CompletionClient::new(completion_config)?),
        db: Arc::new(db),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let exe_path = std::env::current_exe().unwrap_or_default();
    let exe_dir = exe_path.parent().unwrap_or(std::path::Path::new("."));
    let dist_dir = exe_dir.join("dist");
    let static_dir = if dist_dir.exists() {
        dist_dir
    } else {
        std::path::PathBuf::from("dist")
    };

    let app = Router::new()
        .nest("/api", build_router(state))
        .fallback_service(ServeDir::new(&static_dir))
        .layer(cors);

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    println!("\n=== Strategy Analyzer v{} ===", APP_VERSION);
    println!("Listening on http://{}", addr);
    println!("\nEndpoints:");
    println!("  GET  /api/health              - Health check");
    println!("  POST /api/interpret           - Free-text notes -> strategy");
    println!("  POST /api/backtest            - Backtest a strategy on market data");
    println!("  POST /api/backtest/candles    - Backtest a strategy on supplied candles");
    println!("  GET  /api/market/candles      - Fetch candles (proxy)");
    println!("  GET  /api/runs                - Recent backtest runs");
    println!("  GET  /api/runs/:id            - One backtest run");
    println!("  GET  /api/strategies          - Recent strategies");
    println!("\n  Database: {}", db_path);
    println!("\nPress Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Backtest / Interpret commands: CLI mode (no web server)
// ============================================================================

fn cmd_backtest(candles_path: &str, strategy_path: &str, as_json: bool) -> anyhow::Result<()> {
    let candles_raw = std::fs::read_to_string(candles_path)
        .with_context(|| format!("Failed to read candles file {}", candles_path))?;
    let strategy_raw = std::fs::read_to_string(strategy_path)
        .with_context(|| format!("Failed to read strategy file {}", strategy_path))?;

    let candles: Vec<Candle> =
        serde_json::from_str(&candles_raw).context("Candles file is not a JSON candle array")?;
    let spec: StrategySpec =
        serde_json::from_str(&strategy_raw).context("Strategy file is not a valid strategy")?;

    let result = run_backtest(&candles, &spec);
    let summary = summarize(&result.trades);

    if as_json {
        let body = serde_json::json!({
            "strategy": spec,
            "trades": result.trades,
            "stats": result.stats,
            "summary": summary,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!("\n=== Strategy Analyzer v{} ===", APP_VERSION);
    println!(
        "Candles: {} | Direction: {:?} | RR: {} | Risk: {}%",
        candles.len(),
        spec.direction,
        spec.effective_rr(),
        spec.effective_risk_per_trade()
    );
    println!();
    println!("  Trades:        {}", result.stats.total_trades);
    println!("  Win rate:      {:.1}%", result.stats.win_rate);
    println!("  Avg R:         {:.2}", result.stats.avg_r);
    println!("  Total R:       {:.2}", summary.total_r);
    println!("  Profit factor: {:.2}", summary.profit_factor);
    println!("  Max drawdown:  {:.2}R", summary.max_drawdown);
    println!();

    Ok(())
}

async fn cmd_interpret(notes: &str) -> anyhow::Result<()> {
    let client = CompletionClient::new(completion_config())?;
    let spec = client
        .interpret(notes)
        .await
        .context("Failed to interpret notes")?;
    println!("{}", serde_json::to_string_pretty(&spec)?);
    Ok(())
}

// ============================================================================
// API Handlers
// ============================================================================

type ApiError = (StatusCode, Json<serde_json::Value>);
type ApiResult = Result<Json<serde_json::Value>, ApiError>;

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message.into() })),
    )
}

fn server_error(message: &str, details: impl std::fmt::Display) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": message, "details": details.to_string() })),
    )
}

/// GET /api/health
async fn api_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "strategy-analyzer",
        "version": APP_VERSION,
    }))
}

#[derive(Deserialize)]
struct InterpretRequest {
    notes: Option<String>,
}

/// POST /api/interpret - free-text notes to a structured strategy
async fn api_interpret(
    State(state): State<AppState>,
    Json(request): Json<InterpretRequest>,
) -> ApiResult {
    let notes = request
        .notes
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| bad_request("Missing 'notes' string in body"))?;

    let spec = state.interpreter.interpret(&notes).await.map_err(|e| {
        error!("Interpret error: {}", e);
        server_error("Failed to interpret notes", e)
    })?;

    let model = state.interpreter.model_name().to_string();
    let strategy_id = save_strategy(&state, &spec, Some(notes), Some(model)).await;

    Ok(Json(serde_json::json!({
        "strategy": spec,
        "strategyId": strategy_id,
    })))
}

#[derive(Deserialize)]
struct BacktestRequest {
    /// Echoed back unchanged, extra fields included
    strategy: Option<serde_json::Value>,
    symbol: Option<String>,
    from: Option<String>,
    to: Option<String>,
}

/// POST /api/backtest - fetch candles for a symbol/date range and backtest
async fn api_backtest(
    State(state): State<AppState>,
    Json(request): Json<BacktestRequest>,
) -> ApiResult {
    let non_blank = |s: Option<String>| s.filter(|v| !v.trim().is_empty());
    let (Some(raw_strategy), Some(symbol), Some(from), Some(to)) = (
        request.strategy,
        non_blank(request.symbol),
        non_blank(request.from),
        non_blank(request.to),
    ) else {
        return Err(bad_request("Missing strategy, symbol, from, or to"));
    };
    let spec: StrategySpec = serde_json::from_value(raw_strategy.clone())
        .map_err(|e| bad_request(format!("Invalid strategy: {}", e)))?;

    let interval = interval_for(spec.timeframe.as_deref());
    let query = CandleQuery::range(&symbol, interval, &from, &to);
    query.validate().map_err(|e| bad_request(e.to_string()))?;

    info!(symbol = %symbol, interval, from = %from, to = %to, "Starting backtest");

    let candles = state.market_data.fetch_candles(&query).await.map_err(|e| {
        error!("Backtest error: {}", e);
        server_error("Failed to run backtest", e)
    })?;

    if candles.is_empty() {
        return Err(bad_request("No candles returned for given symbol/date"));
    }

    let result = run_backtest(&candles, &spec);
    let summary = summarize(&result.trades);

    let mut body = serde_json::json!({
        "symbol": symbol,
        "from": from,
        "to": to,
        "interval": interval,
        "strategy": raw_strategy,
        "trades": result.trades,
        "stats": result.stats,
        "summary": summary,
    });

    let strategy_id = save_strategy(&state, &spec, None, None).await;
    let run = BacktestRunRecord {
        id: None,
        strategy_id,
        symbol,
        interval: interval.to_string(),
        from_date: from,
        to_date: to,
        candle_count: candles.len() as i64,
        total_trades: result.stats.total_trades as i64,
        win_rate: result.stats.win_rate,
        avg_r: result.stats.avg_r,
        total_r: summary.total_r,
        profit_factor: summary.profit_factor,
        max_drawdown: summary.max_drawdown,
        result_json: body.to_string(),
        created_at: None,
    };
    let run_id = match BacktestRunRepository::new(state.db.pool()).save(&run).await {
        Ok(id) => Some(id),
        Err(e) => {
            warn!("Failed to save backtest run: {}", e);
            None
        }
    };
    body["runId"] = serde_json::json!(run_id);

    Ok(Json(body))
}

#[derive(Deserialize)]
struct CandlesBacktestRequest {
    #[serde(default)]
    strategy: StrategySpec,
    candles: Vec<Candle>,
}

/// POST /api/backtest/candles - backtest caller-supplied candles
async fn api_backtest_candles(Json(request): Json<CandlesBacktestRequest>) -> ApiResult {
    let result = run_backtest(&request.candles, &request.strategy);
    let summary = summarize(&result.trades);

    Ok(Json(serde_json::json!({
        "trades": result.trades,
        "stats": result.stats,
        "summary": summary,
    })))
}

#[derive(Deserialize)]
struct MarketCandlesParams {
    symbol: Option<String>,
    interval: Option<String>,
    from: Option<String>,
    to: Option<String>,
    limit: Option<u32>,
}

/// GET /api/market/candles - proxy to the market-data provider
async fn api_market_candles(
    State(state): State<AppState>,
    Query(params): Query<MarketCandlesParams>,
) -> ApiResult {
    let symbol = params
        .symbol
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| bad_request("Missing symbol"))?;
    let interval = interval_for(params.interval.as_deref());

    let query = CandleQuery {
        symbol: symbol.clone(),
        interval: interval.to_string(),
        start_date: params.from,
        end_date: params.to,
        output_size: params.limit,
    };
    query.validate().map_err(|e| bad_request(e.to_string()))?;

    match state.market_data.fetch_candles(&query).await {
        Ok(candles) => Ok(Json(serde_json::json!({
            "symbol": symbol,
            "interval": interval,
            "count": candles.len(),
            "candles": candles,
        }))),
        Err(e) => {
            error!("Market data error: {}", e);
            let status = match e {
                MarketDataError::Api(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            Err((
                status,
                Json(serde_json::json!({
                    "error": "Failed to fetch candles",
                    "details": e.to_string(),
                })),
            ))
        }
    }
}

#[derive(Deserialize)]
struct ListParams {
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    20
}

/// GET /api/runs - recent backtest runs (summary columns only)
async fn api_list_runs(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult {
    let runs = BacktestRunRepository::new(state.db.pool())
        .list_recent(params.limit.clamp(1, 200))
        .await
        .map_err(|e| server_error("Failed to list runs", e))?;

    let runs: Vec<serde_json::Value> = runs.iter().map(run_summary_json).collect();
    Ok(Json(serde_json::json!({ "runs": runs })))
}

/// GET /api/runs/:id - one run with its full stored result
async fn api_get_run(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult {
    let run = BacktestRunRepository::new(state.db.pool())
        .get(id)
        .await
        .map_err(|e| server_error("Failed to load run", e))?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": format!("Run {} not found", id) })),
            )
        })?;

    let mut body = run_summary_json(&run);
    body["result"] = serde_json::from_str(&run.result_json).unwrap_or(serde_json::Value::Null);
    Ok(Json(body))
}

/// GET /api/strategies - recent strategies
async fn api_list_strategies(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult {
    let records = StrategyRepository::new(state.db.pool())
        .list_recent(params.limit.clamp(1, 200))
        .await
        .map_err(|e| server_error("Failed to list strategies", e))?;

    let strategies: Vec<serde_json::Value> = records.iter().map(strategy_json).collect();
    Ok(Json(serde_json::json!({ "strategies": strategies })))
}

fn run_summary_json(run: &BacktestRunRecord) -> serde_json::Value {
    serde_json::json!({
        "id": run.id,
        "strategyId": run.strategy_id,
        "symbol": run.symbol,
        "interval": run.interval,
        "from": run.from_date,
        "to": run.to_date,
        "candleCount": run.candle_count,
        "totalTrades": run.total_trades,
        "winRate": run.win_rate,
        "avgR": run.avg_r,
        "totalR": run.total_r,
        "profitFactor": run.profit_factor,
        "maxDrawdown": run.max_drawdown,
        "createdAt": run.created_at,
    })
}

fn strategy_json(record: &StrategyRecord) -> serde_json::Value {
    serde_json::json!({
        "id": record.id,
        "strategy": serde_json::from_str::<serde_json::Value>(&record.spec_json)
            .unwrap_or(serde_json::Value::Null),
        "sourceNotes": record.source_notes,
        "model": record.model,
        "createdAt": record.created_at,
    })
}

/// Persist a strategy; failures are logged and yield `None`
async fn save_strategy(
    state: &AppState,
    spec: &StrategySpec,
    notes: Option<String>,
    model: Option<String>,
) -> Option<i64> {
    let spec_json = match serde_json::to_string(spec) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize strategy: {}", e);
            return None;
        }
    };
    let direction = serde_json::to_value(spec.direction)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();

    let record = NewStrategy {
        direction,
        rr: spec.effective_rr(),
        risk_per_trade: spec.effective_risk_per_trade(),
        timeframe: spec.timeframe.clone(),
        spec_json,
        source_notes: notes,
        model,
    };

    match StrategyRepository::new(state.db.pool()).save(&record).await {
        Ok(id) => Some(id),
        Err(e) => {
            warn!("Failed to save strategy: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use engine::{CompletionError, Direction, ModelOutputFormatError};

    struct FakeMarket {
        candles: Vec<Candle>,
        fail: bool,
    }

    #[async_trait]
    impl MarketDataSource for FakeMarket {
        async fn fetch_candles(
            &self,
            _query: &CandleQuery,
        ) -> Result<Vec<Candle>, MarketDataError> {
            if self.fail {
                return Err(MarketDataError::Http {
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            Ok(self.candles.clone())
        }
    }

    struct FakeInterpreter {
        fail: bool,
    }

    #[async_trait]
    impl StrategyInterpreter for FakeInterpreter {
        fn model_name(&self) -> &str {
            "fake-model"
        }

        async fn interpret(&self, notes: &str) -> Result<StrategySpec, CompletionError> {
            if self.fail {
                return Err(ModelOutputFormatError {
                    reason: "no JSON object found".to_string(),
                    excerpt: "sorry".to_string(),
                }
                .into());
            }
            Ok(StrategySpec {
                direction: Direction::Long,
                rr: Some(3.0),
                notes: Some(notes.to_string()),
                ..Default::default()
            })
        }
    }

    fn candle(time: &str, open: f64, close: f64) -> Candle {
        Candle {
            time: time.to_string(),
            open,
            high: open.max(close),
            low: open.min(close),
            close,
        }
    }

    fn sample_candles() -> Vec<Candle> {
        vec![
            candle("2024-01-02 09:00:00", 1.0, 1.0),
            candle("2024-01-02 10:00:00", 1.0, 1.1),
            candle("2024-01-02 11:00:00", 1.1, 1.0),
        ]
    }

    async fn state(candles: Vec<Candle>, market_fails: bool, interpreter_fails: bool) -> AppState {
        AppState {
            market_data: Arc::new(FakeMarket {
                candles,
                fail: market_fails,
            }),
            interpreter: Arc::new(FakeInterpreter {
                fail: interpreter_fails,
            }),
            db: Arc::new(persistence::Database::in_memory().await.unwrap()),
        }
    }

    fn backtest_request(symbol: Option<&str>, from: &str) -> BacktestRequest {
        BacktestRequest {
            strategy: Some(serde_json::json!({ "rr": 2, "riskPerTrade": 1 })),
            symbol: symbol.map(str::to_string),
            from: Some(from.to_string()),
            to: Some("2024-01-31".to_string()),
        }
    }

    #[test]
    fn test_interval_for_timeframe() {
        assert_eq!(interval_for(Some("15min")), "15min");
        assert_eq!(interval_for(Some("4h")), "4h");
        assert_eq!(interval_for(Some("1day")), "1day");
        assert_eq!(interval_for(Some("weekly")), "1h");
        assert_eq!(interval_for(None), "1h");
    }

    #[tokio::test]
    async fn test_backtest_runs_and_persists() {
        let state = state(sample_candles(), false, false).await;
        let Json(body) = api_backtest(
            State(state.clone()),
            Json(backtest_request(Some("EUR/USD"), "2024-01-01")),
        )
        .await
        .unwrap();

        assert_eq!(body["symbol"], "EUR/USD");
        assert_eq!(body["interval"], "1h");
        assert_eq!(body["stats"]["totalTrades"], 2);
        assert_eq!(body["stats"]["winRate"], 100.0);
        assert_eq!(body["stats"]["equityCurve"][1]["equity"], 4.0);
        assert_eq!(body["summary"]["totalR"], 4.0);
        assert!(body["runId"].is_i64());

        let Json(runs) = api_list_runs(State(state), Query(ListParams { limit: 10 }))
            .await
            .unwrap();
        assert_eq!(runs["runs"].as_array().unwrap().len(), 1);
        assert_eq!(runs["runs"][0]["totalTrades"], 2);
    }

    #[tokio::test]
    async fn test_backtest_echoes_caller_strategy() {
        let state = state(sample_candles(), false, false).await;
        let mut request = backtest_request(Some("EUR/USD"), "2024-01-01");
        let strategy = serde_json::json!({
            "direction": null,
            "rr": 3,
            "entryRule": "break of Asian range",
        });
        request.strategy = Some(strategy.clone());

        let Json(body) = api_backtest(State(state), Json(request)).await.unwrap();
        assert_eq!(body["strategy"], strategy);
        assert_eq!(body["trades"][0]["rMultiple"], 3.0);
    }

    #[tokio::test]
    async fn test_backtest_invalid_strategy_is_bad_request() {
        let state = state(sample_candles(), false, false).await;
        let mut request = backtest_request(Some("EUR/USD"), "2024-01-01");
        request.strategy = Some(serde_json::json!({ "direction": "sideways" }));

        let (status, Json(body)) = api_backtest(State(state), Json(request))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid strategy"));
    }

    #[tokio::test]
    async fn test_backtest_missing_fields_is_bad_request() {
        let state = state(sample_candles(), false, false).await;
        let (status, Json(body)) = api_backtest(
            State(state),
            Json(backtest_request(None, "2024-01-01")),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing strategy, symbol, from, or to");
    }

    #[tokio::test]
    async fn test_backtest_bad_date_is_bad_request() {
        let state = state(sample_candles(), false, false).await;
        let (status, _) = api_backtest(
            State(state),
            Json(backtest_request(Some("AAPL"), "last week")),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_backtest_without_candles_is_bad_request() {
        let state = state(Vec::new(), false, false).await;
        let (status, Json(body)) = api_backtest(
            State(state),
            Json(backtest_request(Some("AAPL"), "2024-01-01")),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No candles returned for given symbol/date");
    }

    #[tokio::test]
    async fn test_backtest_upstream_failure_is_server_error() {
        let state = state(sample_candles(), true, false).await;
        let (status, Json(body)) = api_backtest(
            State(state),
            Json(backtest_request(Some("AAPL"), "2024-01-01")),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to run backtest");
        assert!(body["details"].as_str().unwrap().contains("503"));
    }

    #[tokio::test]
    async fn test_backtest_candles_endpoint() {
        let Json(body) = api_backtest_candles(Json(CandlesBacktestRequest {
            strategy: StrategySpec::default(),
            candles: Vec::new(),
        }))
        .await
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "trades": [],
                "stats": { "totalTrades": 0, "winRate": 0.0, "avgR": 0.0, "equityCurve": [] },
                "summary": {
                    "trades": 0, "wins": 0, "losses": 0, "winRate": 0.0, "totalR": 0.0,
                    "avgR": 0.0, "profitFactor": 0.0, "maxDrawdown": 0.0
                }
            })
        );
    }

    #[tokio::test]
    async fn test_interpret_saves_strategy() {
        let state = state(Vec::new(), false, false).await;
        let Json(body) = api_interpret(
            State(state.clone()),
            Json(InterpretRequest {
                notes: Some("Longs only at London open, 3R".to_string()),
            }),
        )
        .await
        .unwrap();

        assert_eq!(body["strategy"]["direction"], "long");
        assert_eq!(body["strategy"]["rr"], 3.0);
        assert!(body["strategyId"].is_i64());

        let Json(list) = api_list_strategies(State(state), Query(ListParams { limit: 5 }))
            .await
            .unwrap();
        assert_eq!(list["strategies"][0]["model"], "fake-model");
        assert_eq!(
            list["strategies"][0]["sourceNotes"],
            "Longs only at London open, 3R"
        );
    }

    #[tokio::test]
    async fn test_interpret_blank_notes_is_bad_request() {
        let state = state(Vec::new(), false, false).await;
        let (status, _) = api_interpret(
            State(state),
            Json(InterpretRequest {
                notes: Some("   ".to_string()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_interpret_format_error_is_server_error() {
        let state = state(Vec::new(), false, true).await;
        let (status, Json(body)) = api_interpret(
            State(state),
            Json(InterpretRequest {
                notes: Some("anything".to_string()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to interpret notes");
        assert!(body["details"]
            .as_str()
            .unwrap()
            .contains("no JSON object found"));
    }

    #[tokio::test]
    async fn test_missing_run_is_not_found() {
        let state = state(Vec::new(), false, false).await;
        let (status, _) = api_get_run(State(state), Path(42)).await.unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
