// diagnostics-service-rs/src/tests.rs
// Unit tests for prompt assembly, response parsing, validation and the
// fetcher/client building blocks.

use crate::jenkins::{extract_script_element, JenkinsError};
use crate::llm::LlmError;
use crate::notifier::TaskStatus;
use crate::orchestrator::{DiagnosticRequest, LATEST_BUILD_ALIAS};
use crate::parser::{
    extract_title_description, DESCRIPTION_PLACEHOLDER, TITLE_PLACEHOLDER,
};
use crate::prompt::{
    escape_braces, ChatMessage, Conversation, PromptTemplate, Role, ANALYSIS_TEMPLATE,
};
use crate::validation::{
    validate_analyze, validate_chat, validate_create_issue, ValidationError,
};
use crate::{AnalyzeRequest, ChatRequest, CreateIssueRequest};

#[test]
fn test_escape_braces() {
    assert_eq!(escape_braces("plain text"), "plain text");
    assert_eq!(escape_braces("a{b}c"), "a{{b}}c");
    assert_eq!(escape_braces("{{}}"), "{{{{}}}}");
}

#[test]
fn test_template_render_substitutes_placeholders() {
    let template = PromptTemplate::new("Logs:\n{logs}\nScript:\n{build_script}");
    let rendered = template.render(&[("logs", "line one"), ("build_script", "mvn install")]);
    assert_eq!(rendered, "Logs:\nline one\nScript:\nmvn install");
}

#[test]
fn test_template_render_inserts_values_verbatim() {
    // Braces inside substituted values must not be re-scanned as slots.
    let template = PromptTemplate::new("Logs:\n{logs}");
    let rendered = template.render(&[("logs", "error in {main}")]);
    assert_eq!(rendered, "Logs:\nerror in {main}");
}

#[test]
fn test_template_render_unknown_placeholder_is_empty() {
    let template = PromptTemplate::new("a{missing}b");
    assert_eq!(template.render(&[]), "ab");
}

#[test]
fn test_template_render_collapses_doubled_braces() {
    let template = PromptTemplate::new("json: {{\"key\": 1}}");
    assert_eq!(template.render(&[]), "json: {\"key\": 1}");
}

#[test]
fn test_analysis_template_contains_artifacts() {
    let rendered = ANALYSIS_TEMPLATE.render(&[
        ("logs", "BUILD FAILED"),
        ("build_script", "pipeline { stage('x') }"),
    ]);
    assert!(rendered.contains("Logs:\nBUILD FAILED"));
    assert!(rendered.contains("Build Script:\npipeline { stage('x') }"));
    assert!(rendered.starts_with("Analyze the following Jenkins logs"));
}

#[test]
fn test_user_brace_round_trip() {
    // A literal brace in caller content survives assembly exactly once.
    let mut conversation = Conversation::new();
    conversation.push_user("set {x} to {y}");
    let prompt = conversation.assemble();
    assert_eq!(prompt.messages.len(), 1);
    assert_eq!(prompt.messages[0].content, "set {x} to {y}");
}

#[test]
fn test_assistant_brace_round_trip() {
    // Escaping applies uniformly: replayed assistant output with braces
    // must survive too.
    let history = vec![
        ChatMessage {
            role: Role::User,
            content: "show me the config".to_string(),
        },
        ChatMessage {
            role: Role::Assistant,
            content: "use { \"retries\": 3 }".to_string(),
        },
    ];
    let prompt = Conversation::from_history(&history).assemble();
    assert_eq!(prompt.messages[1].content, "use { \"retries\": 3 }");
    assert_eq!(prompt.messages[1].role, Role::Assistant);
}

#[test]
fn test_assembly_is_idempotent() {
    let history = vec![
        ChatMessage {
            role: Role::User,
            content: "what failed in {job}?".to_string(),
        },
        ChatMessage {
            role: Role::Assistant,
            content: "the compile stage".to_string(),
        },
    ];
    let conversation = Conversation::from_history(&history);
    let first = conversation.assemble();
    let second = conversation.assemble();
    assert_eq!(first, second);

    // Rebuilding from the same history assembles identically as well.
    let rebuilt = Conversation::from_history(&history).assemble();
    assert_eq!(first, rebuilt);
}

#[test]
fn test_role_accepts_legacy_ai_alias() {
    let message: ChatMessage = serde_json::from_str(r#"{"role":"ai","content":"hi"}"#).unwrap();
    assert_eq!(message.role, Role::Assistant);

    let serialized = serde_json::to_string(&message).unwrap();
    assert!(serialized.contains("\"assistant\""));
}

#[test]
fn test_extract_title_and_description() {
    let text = "Title: Build failed on step 3\nDescription: The maven stage\nran out of heap.";
    let fields = extract_title_description(text);
    assert_eq!(fields.title.as_deref(), Some("Build failed on step 3"));
    assert_eq!(
        fields.description.as_deref(),
        Some("The maven stage\nran out of heap.")
    );
    assert!(fields.has_title());
}

#[test]
fn test_extract_tolerates_markdown_decoration() {
    let text = "**Title:** Flaky integration test\n**Description:** Restart fixed it.";
    let fields = extract_title_description(text);
    assert_eq!(fields.title.as_deref(), Some("Flaky integration test"));
    assert_eq!(fields.description.as_deref(), Some("Restart fixed it."));
}

#[test]
fn test_extract_missing_labels_resolves_to_placeholders() {
    let fields = extract_title_description("nothing useful in here");
    assert!(!fields.has_title());
    assert_eq!(fields.title, None);

    let draft = fields.resolve();
    assert_eq!(draft.title, TITLE_PLACEHOLDER);
    assert_eq!(draft.description, DESCRIPTION_PLACEHOLDER);
}

#[test]
fn test_extract_empty_title_is_not_usable() {
    let fields = extract_title_description("Title:\nDescription: something");
    assert!(!fields.has_title());
}

#[test]
fn test_validate_analyze_rejects_missing_fields() {
    let mut request = AnalyzeRequest {
        jenkins_url: Some("http://jenkins.local".to_string()),
        username: Some("ci-bot".to_string()),
        api_token: Some("token".to_string()),
        job_name: Some("nightly".to_string()),
        build_number: None,
    };
    assert!(validate_analyze(&request).is_ok());

    request.api_token = None;
    assert!(matches!(
        validate_analyze(&request),
        Err(ValidationError::MissingFields)
    ));

    request.api_token = Some("  ".to_string());
    assert!(matches!(
        validate_analyze(&request),
        Err(ValidationError::MissingFields)
    ));
}

#[test]
fn test_validate_chat_rejects_empty_message() {
    let request = ChatRequest {
        message: "".to_string(),
        message_log: Vec::new(),
    };
    assert!(matches!(
        validate_chat(&request),
        Err(ValidationError::NoMessage)
    ));

    let request = ChatRequest {
        message: "hello".to_string(),
        message_log: Vec::new(),
    };
    assert_eq!(validate_chat(&request).unwrap(), "hello");
}

#[test]
fn test_validate_create_issue_requires_all_fields() {
    let request = CreateIssueRequest {
        github_user: Some("octocat".to_string()),
        github_repo: Some("hello-world".to_string()),
        github_token: Some("ghp_token".to_string()),
        issue_text: None,
    };
    assert!(matches!(
        validate_create_issue(&request),
        Err(ValidationError::MissingFields)
    ));
}

#[test]
fn test_build_ref_defaults_to_latest() {
    let mut request = DiagnosticRequest {
        jenkins_url: "http://jenkins.local".to_string(),
        username: "ci-bot".to_string(),
        api_token: "token".to_string(),
        job_name: "nightly".to_string(),
        build_number: None,
    };
    assert_eq!(request.build_ref(), LATEST_BUILD_ALIAS);

    request.build_number = Some("".to_string());
    assert_eq!(request.build_ref(), LATEST_BUILD_ALIAS);

    request.build_number = Some("42".to_string());
    assert_eq!(request.build_ref(), "42");
}

#[test]
fn test_jenkins_status_error_message() {
    // The operator-visible failure text embeds the upstream status code.
    assert_eq!(
        JenkinsError::Status(404).to_string(),
        "Failed to fetch logs: 404"
    );
}

#[test]
fn test_extract_script_element() {
    let xml = "<project><builders><hudson.tasks.Shell><script>mvn clean install</script></hudson.tasks.Shell></builders></project>";
    assert_eq!(
        extract_script_element(xml),
        Some("mvn clean install".to_string())
    );

    // No script element: older-style jobs.
    assert_eq!(extract_script_element("<project><actions/></project>"), None);

    // Malformed document degrades to absence, not an error.
    assert_eq!(extract_script_element("not xml at all"), None);
}

#[test]
fn test_task_status_wire_format() {
    assert_eq!(
        serde_json::to_string(&TaskStatus::InProgress).unwrap(),
        "\"In Progress\""
    );
    assert_eq!(
        serde_json::to_string(&TaskStatus::Completed).unwrap(),
        "\"Completed\""
    );
}

#[test]
fn test_llm_error_classification() {
    assert!(LlmError::ServerError("502".to_string()).is_retryable());
    assert!(LlmError::NetworkError("timeout".to_string()).is_retryable());
    assert!(LlmError::RateLimitExceeded("429".to_string()).is_retryable());
    assert!(!LlmError::InvalidRequest("bad prompt".to_string()).is_retryable());
    assert!(!LlmError::ParseError("no choices".to_string()).is_retryable());
}
