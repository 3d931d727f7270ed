// diagnostics-service-rs/src/llm.rs
//
// HTTP client for the inference backend (OpenAI-compatible API)
//
// This module provides:
// - Real HTTP calls to the completion backend via reqwest
// - Proper error handling with classification of retryable vs. non-retryable errors
// - Configuration via environment variables
//
// Configuration (.env file):
// - LLM_API_URL: API endpoint URL (defaults to a local Ollama-compatible endpoint)
// - LLM_MODEL: Model to use (default: "deepseek-r1:1.5b")
// - LLM_API_KEY: Optional API key; local backends need none
// - LLM_TEMPERATURE: Sampling temperature (default: 0.3)
//
// The client performs exactly one request per `complete` call. Retry
// decisions belong to the orchestrator; the error classification here is
// what it keys those decisions on.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::prompt::Prompt;

const DEFAULT_API_URL: &str = "http://localhost:11434/v1/chat/completions";
const DEFAULT_MODEL: &str = "deepseek-r1:1.5b";
const DEFAULT_TEMPERATURE: f32 = 0.3;
const REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: WireMessage,
}

/// Custom error type for inference operations
#[derive(Debug)]
pub enum LlmError {
    // Non-retryable: client-side errors that won't be fixed by retrying
    InvalidRequest(String),
    // Retryable with increasing delays
    RateLimitExceeded(String),
    // Retryable: server-side errors that might be transient
    ServerError(String),
    // Retryable: connection issues, timeouts, network failures
    NetworkError(String),
    // Response payload errors
    ParseError(String),
    UnknownError(String),
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            LlmError::RateLimitExceeded(msg) => write!(f, "Rate limit exceeded: {}", msg),
            LlmError::ServerError(msg) => write!(f, "Server error: {}", msg),
            LlmError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            LlmError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            LlmError::UnknownError(msg) => write!(f, "Unknown error: {}", msg),
        }
    }
}

impl std::error::Error for LlmError {}

impl LlmError {
    /// True when another attempt might succeed without intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::ServerError(_) | LlmError::NetworkError(_) | LlmError::RateLimitExceeded(_)
        )
    }
}

/// Inference backend configuration, read once at process start and
/// immutable afterwards.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_url: String,
    pub model: String,
    pub temperature: f32,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            api_key: None,
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}

impl LlmConfig {
    pub fn from_env() -> Self {
        let api_url = env::var("LLM_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let model = env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let temperature = env::var("LLM_TEMPERATURE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TEMPERATURE);
        let api_key = env::var("LLM_API_KEY").ok().filter(|key| !key.is_empty());

        Self {
            api_url,
            model,
            temperature,
            api_key,
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}

/// The synchronous seam between the orchestrator and whatever produces
/// completions. Production uses `LlmClient`; tests substitute scripted
/// backends.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError>;
}

#[derive(Debug)]
pub struct LlmClient {
    client: Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();

        log::info!(
            "LLM client initialized: url={}, model={}, temperature={}",
            config.api_url,
            config.model,
            config.temperature
        );

        Self { client, config }
    }

    // Execute a single request attempt
    async fn execute_request(
        &self,
        request_body: &ChatCompletionRequest,
    ) -> Result<String, LlmError> {
        let mut request = self
            .client
            .post(&self.config.api_url)
            .header("Content-Type", "application/json")
            .json(request_body);

        if let Some(api_key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        // Send the HTTP request
        let response = match request.send().await {
            Ok(resp) => resp,
            Err(err) => {
                // Categorize network errors
                if err.is_timeout() {
                    return Err(LlmError::NetworkError(format!(
                        "Request timed out: {}",
                        err
                    )));
                } else if err.is_connect() {
                    return Err(LlmError::NetworkError(format!(
                        "Connection failed: {}",
                        err
                    )));
                } else {
                    return Err(LlmError::NetworkError(format!("Network error: {}", err)));
                }
            }
        };

        // Handle HTTP status codes
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();

            return match status.as_u16() {
                400 => Err(LlmError::InvalidRequest(format!("Bad request: {}", text))),
                401 => Err(LlmError::InvalidRequest(format!("Unauthorized: {}", text))),
                403 => Err(LlmError::InvalidRequest(format!("Forbidden: {}", text))),
                404 => Err(LlmError::InvalidRequest(format!("Not found: {}", text))),
                429 => Err(LlmError::RateLimitExceeded(format!(
                    "Rate limit exceeded: {}",
                    text
                ))),
                500 | 502 | 503 | 504 => Err(LlmError::ServerError(format!(
                    "Server error ({}): {}",
                    status, text
                ))),
                _ => Err(LlmError::UnknownError(format!(
                    "Unknown error ({}): {}",
                    status, text
                ))),
            };
        }

        // Parse the successful response
        let response_data: Result<ChatCompletionResponse, _> = response.json().await;
        match response_data {
            Ok(data) => {
                if let Some(choice) = data.choices.first() {
                    Ok(choice.message.content.clone())
                } else {
                    Err(LlmError::ParseError(
                        "No choices returned in response".to_string(),
                    ))
                }
            }
            Err(err) => Err(LlmError::ParseError(format!(
                "Failed to parse response: {}",
                err
            ))),
        }
    }
}

#[async_trait]
impl CompletionBackend for LlmClient {
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
        let messages = prompt
            .messages
            .iter()
            .map(|message| WireMessage {
                role: message.role.as_str().to_string(),
                content: message.content.clone(),
            })
            .collect();

        let request_body = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            temperature: self.config.temperature,
        };

        log::info!(
            "Sending inference request to {} (model: {}, turns: {})",
            self.config.api_url,
            self.config.model,
            request_body.messages.len()
        );

        self.execute_request(&request_body).await
    }
}
