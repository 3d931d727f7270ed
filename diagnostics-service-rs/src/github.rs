// diagnostics-service-rs/src/github.rs
//
// Issue publisher for the GitHub REST API.
//
// One authenticated POST per call. Success is keyed on 201 Created; any
// other outcome passes the upstream status code and raw body through
// verbatim so the operator sees exactly what GitHub said.

use reqwest::Client;
use std::env;
use std::time::Duration;

use crate::parser::IssueDraft;

const DEFAULT_API_BASE: &str = "https://api.github.com";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const USER_AGENT: &str = concat!("diagnostics-service/", env!("CARGO_PKG_VERSION"));

/// Result of one publication attempt. `response` is the created issue's
/// URL on success, otherwise the raw upstream body (or transport error
/// text, with status code 0).
#[derive(Debug, Clone)]
pub struct IssueOutcome {
    pub success: bool,
    pub response: String,
    pub status_code: u16,
}

#[derive(Debug)]
pub struct GithubClient {
    client: Client,
    api_base: String,
}

impl GithubClient {
    pub fn new() -> Self {
        let api_base = env::var("GITHUB_API_URL").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        Self::with_api_base(&api_base)
    }

    pub fn with_api_base(api_base: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Submits the draft as a new issue on `owner/repo`.
    pub async fn create_issue(
        &self,
        owner: &str,
        repo: &str,
        token: &str,
        draft: &IssueDraft,
    ) -> IssueOutcome {
        let url = format!("{}/repos/{}/{}/issues", self.api_base, owner, repo);
        let body = serde_json::json!({
            "title": draft.title,
            "body": draft.description,
        });

        let response = match self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", token))
            .header("Accept", "application/vnd.github+json")
            .json(&body)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(err) => {
                log::error!("Issue creation request to {}/{} failed: {}", owner, repo, err);
                return IssueOutcome {
                    success: false,
                    response: format!("Issue creation failed: {}", err),
                    status_code: 0,
                };
            }
        };

        let status_code = response.status().as_u16();
        let body_text = response.text().await.unwrap_or_default();

        if status_code == 201 {
            // The canonical URL of the created issue.
            let issue_url = serde_json::from_str::<serde_json::Value>(&body_text)
                .ok()
                .and_then(|value| {
                    value
                        .get("html_url")
                        .and_then(|url| url.as_str())
                        .map(|url| url.to_string())
                })
                .unwrap_or_else(|| body_text.clone());

            log::info!("Created issue on {}/{}: {}", owner, repo, issue_url);
            IssueOutcome {
                success: true,
                response: issue_url,
                status_code,
            }
        } else {
            log::error!(
                "Issue creation on {}/{} returned {}: {}",
                owner,
                repo,
                status_code,
                body_text
            );
            IssueOutcome {
                success: false,
                response: body_text,
                status_code,
            }
        }
    }
}

impl Default for GithubClient {
    fn default() -> Self {
        Self::new()
    }
}
