// diagnostics-service-rs/src/prompt.rs
//
// Conversation model and prompt assembly for the diagnostic pipeline.
//
// A Conversation is an ordered sequence of role-tagged messages. Message
// content is stored in template form: literal braces are doubled on entry
// (`escape_braces`) because the template engine treats `{`/`}` as
// placeholder syntax. Assembly renders every message through the engine,
// which collapses the doubled braces back to single literals, so a brace
// in caller-supplied content survives the round trip exactly once.

use serde::{Deserialize, Serialize};

/// The author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    // Older clients send "ai" for assistant turns.
    #[serde(alias = "ai")]
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single role-tagged conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// The assembled prompt handed to the inference backend.
///
/// Messages here are fully rendered: placeholder slots substituted and
/// escaped braces collapsed back to literals.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub messages: Vec<ChatMessage>,
}

/// Doubles every literal brace so the template engine reproduces it
/// verbatim instead of treating it as placeholder syntax.
pub fn escape_braces(content: &str) -> String {
    content.replace('{', "{{").replace('}', "}}")
}

/// Minimal `{placeholder}` substitution engine.
///
/// `{{` and `}}` render as literal braces. Unknown placeholders render as
/// empty. Substituted values are inserted verbatim and never re-scanned.
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    template: &'static str,
}

impl PromptTemplate {
    pub const fn new(template: &'static str) -> Self {
        Self { template }
    }

    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        render_template(self.template, vars)
    }
}

fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    out.push('{');
                    continue;
                }
                // Placeholder slot: consume up to the closing brace.
                let mut name = String::new();
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    name.push(inner);
                }
                if !closed {
                    // Unterminated slot at end of input; keep the raw text.
                    out.push('{');
                    out.push_str(&name);
                    continue;
                }
                if let Some((_, value)) = vars.iter().find(|(key, _)| *key == name) {
                    out.push_str(value);
                }
            }
            '}' => {
                if chars.peek() == Some(&'}') {
                    chars.next();
                }
                out.push('}');
            }
            other => out.push(other),
        }
    }

    out
}

/// Structured analysis request wrapped around the fetched build artifacts.
pub const ANALYSIS_TEMPLATE: PromptTemplate = PromptTemplate::new(
    "Analyze the following Jenkins logs and respond strictly in the format below and explain everything in detail:\n\n\
     **Reason of failure (If any):**\n[Provide the reason if a failure is detected]\n\n\
     **Solution to failure:**\n[Suggest a solution if a failure is found with detailed information]\n\n\
     **Analysis of logs:**\n[Summarize the key insights from the logs]\n\n\
     **New build Script**\n[Give a new fixed build script based on the old one]\n\n\
     -----------------------------\n\
     Logs:\n{logs}\n\n\
     Build Script:\n{build_script}",
);

/// Issue-draft request: instructs the model to reply with labeled
/// `Title:` / `Description:` lines the response parser can extract.
pub const ISSUE_TEMPLATE: PromptTemplate = PromptTemplate::new(
    "Read the following Jenkins failure report and write a GitHub issue for it.\n\
     Respond strictly in the format below:\n\n\
     Title: [one-line summary of the failure]\n\
     Description: [detailed description of the failure, its likely cause, and the suggested fix]\n\n\
     -----------------------------\n\
     Report:\n{report}",
);

/// Ordered, request-scoped sequence of conversation turns.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replays caller-supplied history. Escaping is applied to every turn
    /// regardless of role: replayed assistant output can carry literal
    /// braces just as user input can.
    pub fn from_history(history: &[ChatMessage]) -> Self {
        let mut conversation = Self::new();
        for message in history {
            match message.role {
                Role::User => conversation.push_user(&message.content),
                Role::Assistant => conversation.push_assistant(&message.content),
            }
        }
        conversation
    }

    pub fn push_user(&mut self, content: &str) {
        self.messages.push(ChatMessage {
            role: Role::User,
            content: escape_braces(content),
        });
    }

    pub fn push_assistant(&mut self, content: &str) {
        self.messages.push(ChatMessage {
            role: Role::Assistant,
            content: escape_braces(content),
        });
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Renders every turn through the template engine (no variables), in
    /// order. Identical conversations always assemble to byte-identical
    /// prompts.
    pub fn assemble(&self) -> Prompt {
        let messages = self
            .messages
            .iter()
            .map(|message| ChatMessage {
                role: message.role,
                content: render_template(&message.content, &[]),
            })
            .collect();
        Prompt { messages }
    }
}
