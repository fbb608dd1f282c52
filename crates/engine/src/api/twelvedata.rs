//! TwelveData `time_series` client for historical OHLC candles

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use super::MarketDataSource;
use crate::types::Candle;

pub const DEFAULT_BASE_URL: &str = "https://api.twelvedata.com";
/// Largest `outputsize` TwelveData accepts
pub const MAX_OUTPUT_SIZE: u32 = 5000;

#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("TWELVEDATA_API_KEY is missing")]
    MissingApiKey,

    #[error("Invalid date '{0}': expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS")]
    InvalidDate(String),

    #[error("TwelveData HTTP error {status}: {body}")]
    Http { status: u16, body: String },

    #[error("TwelveData API error: {0}")]
    Api(String),

    #[error("Invalid candle at {time}: {reason}")]
    InvalidCandle { time: String, reason: String },

    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Connection settings, passed in by the caller
#[derive(Debug, Clone)]
pub struct MarketDataClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for MarketDataClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

/// What to fetch
#[derive(Debug, Clone, PartialEq)]
pub struct CandleQuery {
    pub symbol: String,
    /// TwelveData interval, e.g. `15min`, `1h`, `4h`, `1day`
    pub interval: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// Defaults to (and is capped at) [`MAX_OUTPUT_SIZE`]
    pub output_size: Option<u32>,
}

impl CandleQuery {
    pub fn range(symbol: &str, interval: &str, start_date: &str, end_date: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            interval: interval.to_string(),
            start_date: Some(start_date.to_string()),
            end_date: Some(end_date.to_string()),
            output_size: None,
        }
    }

    /// Check the date bounds before spending a request on them
    pub fn validate(&self) -> Result<(), MarketDataError> {
        for date in [&self.start_date, &self.end_date].into_iter().flatten() {
            let ok = NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok()
                || NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S").is_ok();
            if !ok {
                return Err(MarketDataError::InvalidDate(date.clone()));
            }
        }
        Ok(())
    }

    fn output_size(&self) -> u32 {
        self.output_size
            .unwrap_or(MAX_OUTPUT_SIZE)
            .clamp(1, MAX_OUTPUT_SIZE)
    }
}

#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    status: Option<String>,
    message: Option<String>,
    #[serde(default)]
    values: Vec<RawValue>,
}

/// TwelveData sends prices as strings; accept plain numbers too.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Text(String),
    Number(f64),
}

#[derive(Debug, Deserialize)]
struct RawValue {
    datetime: String,
    open: RawNumber,
    high: RawNumber,
    low: RawNumber,
    close: RawNumber,
}

impl RawValue {
    fn into_candle(self) -> Result<Candle, MarketDataError> {
        let field = |name: &str, raw: &RawNumber| -> Result<f64, MarketDataError> {
            let value = match raw {
                RawNumber::Number(n) => Some(*n),
                RawNumber::Text(s) => s.trim().parse::<f64>().ok(),
            };
            value
                .filter(|v| v.is_finite())
                .ok_or_else(|| MarketDataError::InvalidCandle {
                    time: self.datetime.clone(),
                    reason: format!("{} is not a finite number", name),
                })
        };

        Ok(Candle {
            open: field("open", &self.open)?,
            high: field("high", &self.high)?,
            low: field("low", &self.low)?,
            close: field("close", &self.close)?,
            time: self.datetime,
        })
    }
}

/// Normalize a `time_series` response body into candles
pub fn parse_time_series(body: &str) -> Result<Vec<Candle>, MarketDataError> {
    let response: TimeSeriesResponse = serde_json::from_str(body)?;

    if response.status.as_deref() == Some("error") {
        return Err(MarketDataError::Api(
            response.message.unwrap_or_else(|| "unknown error".to_string()),
        ));
    }

    response
        .values
        .into_iter()
        .map(RawValue::into_candle)
        .collect()
}

/// TwelveData market data client
#[derive(Clone)]
pub struct TwelveDataClient {
    client: Client,
    config: MarketDataClientConfig,
}

impl TwelveDataClient {
    pub fn new(config: MarketDataClientConfig) -> Result<Self, MarketDataError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// Fetch candles in ascending time order
    pub async fn get_time_series(
        &self,
        query: &CandleQuery,
    ) -> Result<Vec<Candle>, MarketDataError> {
        if self.config.api_key.is_empty() {
            return Err(MarketDataError::MissingApiKey);
        }
        query.validate()?;

        let url = format!("{}/time_series", self.config.base_url.trim_end_matches('/'));
        let output_size = query.output_size().to_string();

        let mut params: Vec<(&str, &str)> = vec![
            ("symbol", query.symbol.as_str()),
            ("interval", query.interval.as_str()),
            ("outputsize", output_size.as_str()),
            ("order", "asc"),
            ("apikey", self.config.api_key.as_str()),
        ];
        if let Some(start) = &query.start_date {
            params.push(("start_date", start.as_str()));
        }
        if let Some(end) = &query.end_date {
            params.push(("end_date", end.as_str()));
        }

        debug!(
            symbol = %query.symbol,
            interval = %query.interval,
            start = ?query.start_date,
            end = ?query.end_date,
            "Fetching candles from TwelveData"
        );

        let response = self.client.get(&url).query(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(MarketDataError::Http { status, body });
        }

        let body = response.text().await?;
        let candles = parse_time_series(&body)?;

        info!(symbol = %query.symbol, count = candles.len(), "Fetched candles");
        Ok(candles)
    }
}

#[async_trait]
impl MarketDataSource for TwelveDataClient {
    async fn fetch_candles(&self, query: &CandleQuery) -> Result<Vec<Candle>, MarketDataError> {
        self.get_time_series(query).await
    }
}
