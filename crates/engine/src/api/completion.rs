//! OpenAI-compatible chat completion client used to interpret strategy notes

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::StrategyInterpreter;
use crate::interpret::{build_interpret_prompt, parse_model_output, ModelOutputFormatError};
use crate::types::StrategySpec;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("OPENAI_API_KEY is missing")]
    MissingApiKey,

    #[error("Completion API error {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Completion API returned no choices")]
    EmptyResponse,

    #[error(transparent)]
    Format(#[from] ModelOutputFormatError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Connection settings, passed in by the caller
#[derive(Debug, Clone)]
pub struct CompletionClientConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for CompletionClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.1,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat completion client
#[derive(Clone)]
pub struct CompletionClient {
    client: Client,
    config: CompletionClientConfig,
}

impl CompletionClient {
    pub fn new(config: CompletionClientConfig) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// Send a single user prompt and return the first choice's text
    pub async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        if self.config.api_key.is_empty() {
            return Err(CompletionError::MissingApiKey);
        }

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
        };

        debug!(
            model = %self.config.model,
            prompt_len = prompt.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Http { status, body });
        }

        let chat: ChatResponse = response.json().await?;
        chat.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(CompletionError::EmptyResponse)
    }

    /// Turn free-text strategy notes into a structured strategy
    pub async fn interpret_notes(&self, notes: &str) -> Result<StrategySpec, CompletionError> {
        let prompt = build_interpret_prompt(notes);
        let raw = self.complete(&prompt).await?;

        match parse_model_output::<StrategySpec>(&raw) {
            Ok(spec) => {
                info!(
                    direction = ?spec.direction,
                    rr = ?spec.rr,
                    timeframe = ?spec.timeframe,
                    "Interpreted strategy notes"
                );
                Ok(spec)
            }
            Err(e) => {
                warn!(reason = %e.reason, "Model output could not be parsed");
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl StrategyInterpreter for CompletionClient {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn interpret(&self, notes: &str) -> Result<StrategySpec, CompletionError> {
        self.interpret_notes(notes).await
    }
}
