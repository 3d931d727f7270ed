// diagnostics-service-rs/src/jenkins.rs
//
// Remote artifact fetcher for the Jenkins CI server: console logs and the
// job's build script (from config.xml).
//
// Error policy: the console log is mandatory context, so its failures are
// typed and surfaced to the orchestrator. The build script is optional
// context; any failure on that path degrades to "absent" after logging.

use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Failure fetching a mandatory artifact from the CI server.
#[derive(Debug, Error)]
pub enum JenkinsError {
    /// Non-success HTTP status from the console log endpoint. The display
    /// text is the operator-visible failure message.
    #[error("Failed to fetch logs: {0}")]
    Status(u16),
    /// Transport-level failure (timeout, connection error, bad payload).
    #[error("{0}")]
    Transport(String),
}

/// Credentials and base URL for one CI server, scoped to a single request.
#[derive(Debug, Clone)]
pub struct JenkinsAuth {
    pub base_url: String,
    pub username: String,
    pub api_token: String,
}

#[derive(Debug)]
pub struct JenkinsClient {
    client: Client,
}

impl Default for JenkinsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl JenkinsClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// Fetches the console text of one build.
    ///
    /// `build` is a build number or a Jenkins alias such as `lastBuild`.
    pub async fn fetch_console_log(
        &self,
        auth: &JenkinsAuth,
        job_name: &str,
        build: &str,
    ) -> Result<String, JenkinsError> {
        let url = format!(
            "{}/job/{}/{}/consoleText",
            auth.base_url.trim_end_matches('/'),
            job_name,
            build
        );

        let response = self
            .client
            .get(&url)
            .basic_auth(&auth.username, Some(&auth.api_token))
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            log::warn!("Console log fetch for job '{}' returned {}", job_name, status);
            return Err(JenkinsError::Status(status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|err| JenkinsError::Transport(format!("Failed to read logs: {}", err)))
    }

    /// Fetches the job's build script from config.xml, if the job has one.
    ///
    /// Returns `None` when the config endpoint is unreachable, the XML is
    /// malformed, or no `<script>` element exists. Older-style jobs carry
    /// no inline script and diagnosis proceeds without it.
    pub async fn fetch_build_script(&self, auth: &JenkinsAuth, job_name: &str) -> Option<String> {
        let url = format!(
            "{}/job/{}/config.xml",
            auth.base_url.trim_end_matches('/'),
            job_name
        );

        let response = match self
            .client
            .get(&url)
            .basic_auth(&auth.username, Some(&auth.api_token))
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(err) => {
                log::warn!("Build script fetch for job '{}' failed: {}", job_name, err);
                return None;
            }
        };

        if !response.status().is_success() {
            log::warn!(
                "Build script fetch for job '{}' returned {}",
                job_name,
                response.status()
            );
            return None;
        }

        let xml = match response.text().await {
            Ok(text) => text,
            Err(err) => {
                log::warn!("Failed to read config.xml for job '{}': {}", job_name, err);
                return None;
            }
        };

        extract_script_element(&xml)
    }
}

/// Pulls the text of the first `<script>` element anywhere in the job
/// configuration document.
pub(crate) fn extract_script_element(xml: &str) -> Option<String> {
    let document = match roxmltree::Document::parse(xml) {
        Ok(doc) => doc,
        Err(err) => {
            log::warn!("Failed to parse job config.xml: {}", err);
            return None;
        }
    };

    document
        .descendants()
        .find(|node| node.has_tag_name("script"))
        .and_then(|node| node.text())
        .map(|text| text.to_string())
}

fn classify_transport_error(err: reqwest::Error) -> JenkinsError {
    if err.is_timeout() {
        JenkinsError::Transport(format!("Request timed out: {}", err))
    } else if err.is_connect() {
        JenkinsError::Transport(format!("Connection failed: {}", err))
    } else {
        JenkinsError::Transport(format!("Network error: {}", err))
    }
}
