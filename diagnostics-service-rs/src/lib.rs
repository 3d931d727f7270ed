// diagnostics-service-rs/src/lib.rs
// Jenkins Build Diagnostics Service - HTTP surface
//
// Endpoints:
// - POST /analyze       diagnose a failing build from its console log and build script
// - POST /chat          conversational follow-up against the same backend
// - POST /create-issue  turn free-form failure text into a GitHub issue
// - GET  /health        liveness and uptime
// - GET  /              service descriptor

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;

pub mod github;
pub mod jenkins;
pub mod llm;
pub mod notifier;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod validation;

#[cfg(test)]
mod tests;

use github::GithubClient;
use jenkins::JenkinsClient;
use llm::{CompletionBackend, LlmClient, LlmConfig};
use notifier::TaskNotifier;
use orchestrator::{DiagnosisError, Orchestrator};
use prompt::ChatMessage;

/// Maximum accepted request payload size (2MB); request bodies here carry
/// credentials and text, never build artifacts.
pub const MAX_PAYLOAD_SIZE: usize = 2 * 1024 * 1024;

// Track service start time for uptime reporting
static START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }

    /// Production wiring: every collaborator configured from the
    /// environment. Must be called from within a tokio runtime (the
    /// notifier spawns its sender task).
    pub fn from_env() -> Self {
        let backend: Arc<dyn CompletionBackend> = Arc::new(LlmClient::new(LlmConfig::from_env()));
        Self::new(Orchestrator::new(
            JenkinsClient::new(),
            backend,
            TaskNotifier::from_env(),
            GithubClient::new(),
        ))
    }
}

/// Analyze request body (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeRequest {
    pub jenkins_url: Option<String>,
    pub username: Option<String>,
    pub api_token: Option<String>,
    pub job_name: Option<String>,
    #[serde(rename = "buildNumber")]
    pub build_number: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub logs: String,
    pub analysis: String,
}

/// Chat request body (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub message_log: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Create-issue request body (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct CreateIssueRequest {
    pub github_user: Option<String>,
    pub github_repo: Option<String>,
    pub github_token: Option<String>,
    pub issue_text: Option<String>,
}

/// Publisher result passthrough: the created issue URL on success, the
/// raw upstream body otherwise, plus the upstream status code.
#[derive(Debug, Serialize)]
pub struct CreateIssueResponse {
    pub response: String,
    pub status_code: u16,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub service_name: String,
    pub uptime_seconds: i64,
    pub status: String,
}

fn error_response(err: &DiagnosisError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match err {
        DiagnosisError::Input(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

/// POST /analyze - fetch build artifacts and run the diagnosis pipeline
async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> impl IntoResponse {
    log::info!(
        "Analyze request: job={:?}, build={:?}",
        request.job_name,
        request.build_number
    );

    match state.orchestrator.diagnose(&request).await {
        Ok(result) => (
            StatusCode::OK,
            Json(AnalyzeResponse {
                logs: result.logs,
                analysis: result.analysis,
            }),
        )
            .into_response(),
        Err(err) => {
            log::error!("Analyze request failed: {}", err);
            error_response(&err).into_response()
        }
    }
}

/// POST /chat - conversational exchange with message history
async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> impl IntoResponse {
    let message = match validation::validate_chat(&request) {
        Ok(message) => message,
        Err(err) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: err.to_string(),
                }),
            )
                .into_response();
        }
    };

    match state.orchestrator.chat(&request.message_log, &message).await {
        Ok(reply) => (StatusCode::OK, Json(ChatResponse { response: reply })).into_response(),
        Err(err) => {
            log::error!("Chat request failed: {}", err);
            error_response(&err).into_response()
        }
    }
}

/// POST /create-issue - extract a title/description draft and publish it
async fn create_issue_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateIssueRequest>,
) -> impl IntoResponse {
    match state.orchestrator.diagnose_and_file(&request).await {
        Ok(outcome) => {
            // Success and upstream failure share one shape; the embedded
            // status code tells them apart.
            (
                StatusCode::OK,
                Json(CreateIssueResponse {
                    response: outcome.response,
                    status_code: outcome.status_code,
                }),
            )
                .into_response()
        }
        Err(err) => {
            log::error!("Create-issue request failed: {}", err);
            error_response(&err).into_response()
        }
    }
}

/// GET /health - Health check endpoint
async fn health_handler() -> impl IntoResponse {
    let uptime = START_TIME.elapsed().as_secs() as i64;

    Json(HealthResponse {
        healthy: true,
        service_name: config_rs::get_formatted_service_name("DIAGNOSTICS"),
        uptime_seconds: uptime,
        status: "SERVING".to_string(),
    })
}

/// GET / - Root endpoint
async fn root_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "Jenkins Build Diagnostics Service",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "GET /health",
            "POST /analyze",
            "POST /chat",
            "POST /create-issue"
        ]
    }))
}

/// Builds the service router around the given state.
pub fn app(state: AppState) -> Router {
    let _ = *START_TIME;

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/analyze", post(analyze_handler))
        .route("/chat", post(chat_handler))
        .route("/create-issue", post(create_issue_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(RequestBodyLimitLayer::new(MAX_PAYLOAD_SIZE))
        .with_state(Arc::new(state))
}
