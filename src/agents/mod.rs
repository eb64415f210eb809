pub mod documentation;
pub mod registry;
pub mod telegram;
pub mod web;

use crate::types::{AgentId, AgentResponse, ErrorKind};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

// Re-export commonly used types
pub use documentation::DocumentationAgent;
pub use registry::{AgentRegistry, AgentRegistryBuilder};
pub use telegram::TelegramAgent;
pub use web::WebAgent;

/// Read-only snapshot of the orchestration state handed to an agent
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub query: String,
    pub conversation_id: String,
    pub context: BTreeMap<String, String>,
    /// Empty until the documentation agent has run
    pub documentation_context: String,
    /// Titles of findings collected so far, in arrival order
    pub previous_findings: Vec<String>,
    pub agents_consulted: Vec<AgentId>,
    /// Cancelled when the caller gives up on the query
    pub cancel: CancellationToken,
}

impl AgentRequest {
    /// Minimal request for a bare query
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            conversation_id: String::new(),
            context: BTreeMap::new(),
            documentation_context: String::new(),
            previous_findings: Vec::new(),
            agents_consulted: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }
}

/// Base trait for all intelligence agents
///
/// Implementations never fail across this boundary: every failure is
/// returned as an [`AgentResponse::failure`] with a typed [`ErrorKind`].
#[async_trait]
pub trait Agent: Send + Sync {
    /// Identifier the agent is registered under
    fn id(&self) -> AgentId;

    /// One-line description shown in agent listings
    fn description(&self) -> String;

    /// Run the agent against a snapshot of the current state
    async fn invoke(&self, request: &AgentRequest) -> AgentResponse;
}

/// Failure of an external source (web page, channel feed, retriever)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("request timed out")]
    Timeout,

    #[error("could not parse response: {0}")]
    Parse(String),
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Unavailable(_) => ErrorKind::SourceUnavailable,
            FetchError::Timeout => ErrorKind::Timeout,
            FetchError::Parse(_) => ErrorKind::ParseError,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_decode() {
            FetchError::Parse(err.to_string())
        } else {
            FetchError::Unavailable(err.to_string())
        }
    }
}

/// Lowercased alphanumeric tokens of a text
pub(crate) fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Whether `keyword` occurs in a text already split by [`tokens`]
///
/// Plain keywords must equal a token or its singular form (`leaks`,
/// `channels`, `vulnerabilities`); keywords containing punctuation or spaces
/// (`zero-day`, `actively exploited`) match as substrings.
pub(crate) fn keyword_matches(keyword: &str, lowered_text: &str, text_tokens: &[String]) -> bool {
    let keyword = keyword.trim().to_lowercase();
    if keyword.is_empty() {
        return false;
    }
    if keyword.chars().all(char::is_alphanumeric) {
        text_tokens.iter().any(|t| token_matches(t, &keyword))
    } else {
        lowered_text.contains(&keyword)
    }
}

fn token_matches(token: &str, keyword: &str) -> bool {
    if token == keyword {
        return true;
    }
    if let Some(stem) = token.strip_suffix("ies") {
        if keyword.strip_suffix('y') == Some(stem) {
            return true;
        }
    }
    token.strip_suffix('s') == Some(keyword) || token.strip_suffix("es") == Some(keyword)
}
