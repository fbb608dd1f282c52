//! Strategy interpretation prompt and best-effort parsing of model output
//!
//! Models are asked for bare JSON but regularly wrap it in prose or code
//! fences. [`parse_model_output`] tries a strict parse first, then retries on
//! the slice between the first `{` and the last `}`.

use serde::de::DeserializeOwned;
use thiserror::Error;

const EXCERPT_LEN: usize = 200;

/// The model returned something that could not be read as the expected JSON
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Model output is not valid JSON ({reason}): {excerpt}")]
pub struct ModelOutputFormatError {
    pub reason: String,
    /// Start of the raw output, for logs and error responses
    pub excerpt: String,
}

impl ModelOutputFormatError {
    fn new(reason: impl Into<String>, raw: &str) -> Self {
        Self {
            reason: reason.into(),
            excerpt: raw.chars().take(EXCERPT_LEN).collect(),
        }
    }
}

/// Build the fixed prompt that turns free-text notes into a strategy object
pub fn build_interpret_prompt(notes: &str) -> String {
    format!(
        r#"You are a trading strategy parser.
The user gives you free-text notes about a daytrading strategy (ICT/SMC/etc.).
You must return a STRICT JSON object with this EXACT schema:

{{
  "direction": "long" | "short" | "both",
  "riskPerTrade": number,
  "rr": number,
  "maxTradesPerDay": number,
  "timeframe": "15min" | "1h" | "4h" | "1day",
  "session": {{
    "start": "HH:MM",
    "end": "HH:MM",
    "timezone": "UTC"
  }},
  "notes": string
}}

Return ONLY valid JSON, no explanation.

User notes:
{}"#,
        notes.trim()
    )
}

/// Parse `raw` as `T`, tolerating prose around a single JSON object.
pub fn parse_model_output<T: DeserializeOwned>(raw: &str) -> Result<T, ModelOutputFormatError> {
    if let Ok(value) = serde_json::from_str(raw) {
        return Ok(value);
    }

    let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) else {
        return Err(ModelOutputFormatError::new("no JSON object found", raw));
    };
    if end < start {
        return Err(ModelOutputFormatError::new("no JSON object found", raw));
    }

    serde_json::from_str(&raw[start..=end])
        .map_err(|e| ModelOutputFormatError::new(e.to_string(), raw))
}
