// diagnostics-service-rs/src/orchestrator.rs
//
// Sequences the diagnostic pipelines: artifact fetch -> prompt assembly ->
// inference -> parse -> (optionally) publish. Owns all request-scoped
// state; nothing survives past the response.

use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use rand::Rng;
use thiserror::Error;

use crate::github::{GithubClient, IssueOutcome};
use crate::jenkins::{JenkinsAuth, JenkinsClient};
use crate::llm::CompletionBackend;
use crate::notifier::{TaskNotifier, TaskStatus};
use crate::parser::{extract_analysis, extract_title_description, IssueDraft};
use crate::prompt::{ChatMessage, Conversation, ANALYSIS_TEMPLATE, ISSUE_TEMPLATE};
use crate::validation::{self, ValidationError};
use crate::{AnalyzeRequest, CreateIssueRequest};

/// Stands in for the build script in the analysis prompt when the job has
/// none.
pub const NO_BUILD_SCRIPT_MARKER: &str = "No build script found";

/// Jenkins alias for the most recent build, used when the caller omits a
/// build number.
pub const LATEST_BUILD_ALIAS: &str = "lastBuild";

const MAX_DRAFT_ATTEMPTS: u32 = 5;

/// A validated diagnostic request; all credential fields are non-empty.
#[derive(Debug, Clone)]
pub struct DiagnosticRequest {
    pub jenkins_url: String,
    pub username: String,
    pub api_token: String,
    pub job_name: String,
    pub build_number: Option<String>,
}

impl DiagnosticRequest {
    fn auth(&self) -> JenkinsAuth {
        JenkinsAuth {
            base_url: self.jenkins_url.clone(),
            username: self.username.clone(),
            api_token: self.api_token.clone(),
        }
    }

    /// Build selector for the console log URL.
    pub fn build_ref(&self) -> &str {
        match &self.build_number {
            Some(number) if !number.trim().is_empty() => number,
            _ => LATEST_BUILD_ALIAS,
        }
    }
}

/// A validated issue submission.
#[derive(Debug, Clone)]
pub struct IssueSubmission {
    pub owner: String,
    pub repo: String,
    pub token: String,
    pub issue_text: String,
}

/// What `/analyze` returns on success.
#[derive(Debug, Clone)]
pub struct DiagnosisResult {
    pub logs: String,
    pub analysis: String,
}

/// The pipeline stages, in execution order. `task_name` is the label the
/// external observer sees for the stage's progress events; validation is
/// internal and emits none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosisStage {
    ValidateInput,
    FetchLog,
    FetchScript,
    Analyze,
    GenerateDraft,
    PublishIssue,
}

impl DiagnosisStage {
    fn task_name(&self) -> Option<&'static str> {
        match self {
            DiagnosisStage::ValidateInput => None,
            DiagnosisStage::FetchLog => Some("Fetching Jenkins Logs"),
            DiagnosisStage::FetchScript => Some("Fetching Build Script"),
            DiagnosisStage::Analyze => Some("Analyzing Jenkins Logs"),
            DiagnosisStage::GenerateDraft => Some("Generating Issue Draft"),
            DiagnosisStage::PublishIssue => Some("Creating GitHub Issue"),
        }
    }
}

/// Terminal failure of a pipeline run.
#[derive(Debug, Error)]
pub enum DiagnosisError {
    #[error(transparent)]
    Input(#[from] ValidationError),
    /// The mandatory console log could not be fetched.
    #[error("{0}")]
    LogFetch(String),
    /// The inference backend failed and the failure is not worth retrying.
    #[error("{0}")]
    Inference(String),
    /// The draft loop exhausted its attempts without a usable title.
    #[error("Failed to extract an issue title after {0} attempts")]
    DraftExtraction(u32),
}

pub struct Orchestrator {
    jenkins: JenkinsClient,
    backend: Arc<dyn CompletionBackend>,
    notifier: TaskNotifier,
    github: GithubClient,
}

impl Orchestrator {
    pub fn new(
        jenkins: JenkinsClient,
        backend: Arc<dyn CompletionBackend>,
        notifier: TaskNotifier,
        github: GithubClient,
    ) -> Self {
        Self {
            jenkins,
            backend,
            notifier,
            github,
        }
    }

    fn begin(&self, stage: DiagnosisStage) {
        if let Some(task) = stage.task_name() {
            self.notifier.notify(task, TaskStatus::InProgress);
        }
    }

    fn finish(&self, stage: DiagnosisStage) {
        if let Some(task) = stage.task_name() {
            self.notifier.notify(task, TaskStatus::Completed);
        }
    }

    /// The diagnosis workflow:
    /// ValidateInput -> FetchLog -> FetchScript -> Analyze -> Respond.
    ///
    /// The log fetch outcome is checked after the (optional) script fetch
    /// and before analysis; a failed log fetch is terminal, a missing
    /// script is not.
    pub async fn diagnose(&self, request: &AnalyzeRequest) -> Result<DiagnosisResult, DiagnosisError> {
        let request = match validation::validate_analyze(request) {
            Ok(validated) => validated,
            Err(err) => {
                log::warn!("{:?} rejected request: {}", DiagnosisStage::ValidateInput, err);
                return Err(DiagnosisError::Input(err));
            }
        };

        let auth = request.auth();
        let build = request.build_ref();

        self.begin(DiagnosisStage::FetchLog);
        let log_result = self
            .jenkins
            .fetch_console_log(&auth, &request.job_name, build)
            .await;
        self.finish(DiagnosisStage::FetchLog);

        self.begin(DiagnosisStage::FetchScript);
        let build_script = self.jenkins.fetch_build_script(&auth, &request.job_name).await;
        self.finish(DiagnosisStage::FetchScript);

        let logs = log_result.map_err(|err| DiagnosisError::LogFetch(err.to_string()))?;

        self.begin(DiagnosisStage::Analyze);
        let script_text = build_script.unwrap_or_else(|| NO_BUILD_SCRIPT_MARKER.to_string());
        let rendered = ANALYSIS_TEMPLATE.render(&[
            ("logs", logs.as_str()),
            ("build_script", script_text.as_str()),
        ]);

        let mut conversation = Conversation::new();
        conversation.push_user(&rendered);
        let prompt = conversation.assemble();

        let reply = self
            .backend
            .complete(&prompt)
            .await
            .map_err(|err| DiagnosisError::Inference(err.to_string()))?;
        self.finish(DiagnosisStage::Analyze);

        log::info!(
            "Diagnosis completed for job '{}' ({} log bytes)",
            request.job_name,
            logs.len()
        );

        Ok(DiagnosisResult {
            logs,
            analysis: extract_analysis(&reply),
        })
    }

    /// The conversational workflow: replay history, append the new user
    /// turn, one inference call, raw text back.
    pub async fn chat(&self, history: &[ChatMessage], message: &str) -> Result<String, DiagnosisError> {
        let mut conversation = Conversation::from_history(history);
        conversation.push_user(message);
        let prompt = conversation.assemble();

        self.backend
            .complete(&prompt)
            .await
            .map_err(|err| DiagnosisError::Inference(err.to_string()))
    }

    /// The issue-filing workflow:
    /// GenerateIssueDraft (bounded retry) -> PublishIssue -> Respond.
    ///
    /// Operates on caller-supplied free text; issue creation is decoupled
    /// from log fetching.
    pub async fn diagnose_and_file(
        &self,
        request: &CreateIssueRequest,
    ) -> Result<IssueOutcome, DiagnosisError> {
        let submission = match validation::validate_create_issue(request) {
            Ok(validated) => validated,
            Err(err) => {
                log::warn!("{:?} rejected request: {}", DiagnosisStage::ValidateInput, err);
                return Err(DiagnosisError::Input(err));
            }
        };

        self.begin(DiagnosisStage::GenerateDraft);
        let draft = self.generate_issue_draft(&submission.issue_text).await?;
        self.finish(DiagnosisStage::GenerateDraft);

        self.begin(DiagnosisStage::PublishIssue);
        let outcome = self
            .github
            .create_issue(&submission.owner, &submission.repo, &submission.token, &draft)
            .await;
        self.finish(DiagnosisStage::PublishIssue);

        Ok(outcome)
    }

    /// Re-runs the assemble -> infer -> extract cycle until a non-empty
    /// title comes back, up to MAX_DRAFT_ATTEMPTS with jittered
    /// exponential backoff between attempts. The loop condition checks the
    /// title only; a missing description resolves to its placeholder.
    async fn generate_issue_draft(&self, issue_text: &str) -> Result<IssueDraft, DiagnosisError> {
        let rendered = ISSUE_TEMPLATE.render(&[("report", issue_text)]);
        let mut backoff = draft_backoff();
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let mut conversation = Conversation::new();
            conversation.push_user(&rendered);
            let prompt = conversation.assemble();

            match self.backend.complete(&prompt).await {
                Ok(reply) => {
                    let fields = extract_title_description(&reply);
                    if fields.has_title() {
                        return Ok(fields.resolve());
                    }
                    log::warn!(
                        "No usable title in inference output (attempt {}/{})",
                        attempt,
                        MAX_DRAFT_ATTEMPTS
                    );
                }
                Err(err) if !err.is_retryable() => {
                    log::error!("Draft generation failed: {}", err);
                    return Err(DiagnosisError::Inference(err.to_string()));
                }
                Err(err) => {
                    log::warn!(
                        "Retryable inference failure during draft generation (attempt {}/{}): {}",
                        attempt,
                        MAX_DRAFT_ATTEMPTS,
                        err
                    );
                }
            }

            if attempt >= MAX_DRAFT_ATTEMPTS {
                return Err(DiagnosisError::DraftExtraction(attempt));
            }

            match backoff.next_backoff() {
                Some(delay) => {
                    // Small extra jitter so concurrent requests don't align.
                    let jitter = rand::thread_rng().gen_range(0..=100);
                    tokio::time::sleep(delay + Duration::from_millis(jitter)).await;
                }
                None => return Err(DiagnosisError::DraftExtraction(attempt)),
            }
        }
    }
}

fn draft_backoff() -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(500))
        .with_max_interval(Duration::from_secs(10))
        .with_multiplier(2.0)
        .with_randomization_factor(0.5)
        .with_max_elapsed_time(None)
        .build()
}
