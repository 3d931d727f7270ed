// diagnostics-service-rs/src/validation.rs
//
// Request field validation: the first line of defense, run before any
// remote call is attempted. Each endpoint's raw request is checked for
// field presence and converted into its validated form.

use thiserror::Error;

use crate::orchestrator::{DiagnosticRequest, IssueSubmission};
use crate::{AnalyzeRequest, ChatRequest, CreateIssueRequest};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required fields")]
    MissingFields,
    #[error("No message provided")]
    NoMessage,
}

fn required(field: &Option<String>) -> Result<String, ValidationError> {
    match field {
        Some(value) if !value.trim().is_empty() => Ok(value.clone()),
        _ => Err(ValidationError::MissingFields),
    }
}

/// All four credential fields must be present; the build number may be
/// omitted (the latest build is diagnosed).
pub fn validate_analyze(request: &AnalyzeRequest) -> Result<DiagnosticRequest, ValidationError> {
    Ok(DiagnosticRequest {
        jenkins_url: required(&request.jenkins_url)?,
        username: required(&request.username)?,
        api_token: required(&request.api_token)?,
        job_name: required(&request.job_name)?,
        build_number: request.build_number.clone(),
    })
}

pub fn validate_chat(request: &ChatRequest) -> Result<String, ValidationError> {
    if request.message.trim().is_empty() {
        return Err(ValidationError::NoMessage);
    }
    Ok(request.message.clone())
}

pub fn validate_create_issue(
    request: &CreateIssueRequest,
) -> Result<IssueSubmission, ValidationError> {
    Ok(IssueSubmission {
        owner: required(&request.github_user)?,
        repo: required(&request.github_repo)?,
        token: required(&request.github_token)?,
        issue_text: required(&request.issue_text)?,
    })
}
