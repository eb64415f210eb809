//! Mock agents and LLM clients shared by the integration suites.

use async_trait::async_trait;
use cybersense::agents::{Agent, AgentRegistry, AgentRequest};
use cybersense::llm::LLMClient;
use cybersense::types::{AgentId, AgentResponse, AppError, ErrorKind, Finding, Result, Severity};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Agent with a scripted answer.
///
/// ```ignore
/// let web = ScriptedAgent::new("web")
///     .with_finding("Web Intel: NVD", Severity::Medium, 0.9)
///     .with_delay(Duration::from_millis(50));
/// ```
#[derive(Clone)]
pub struct ScriptedAgent {
    id: AgentId,
    findings: Vec<(String, AgentId, Severity, f32)>,
    failure: Option<(ErrorKind, String)>,
    delay: Option<Duration>,
    recommendations: Vec<AgentId>,
    context_text: String,
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<AgentRequest>>>,
}

impl ScriptedAgent {
    pub fn new(id: &str) -> Self {
        Self {
            id: AgentId::new(id),
            findings: Vec::new(),
            failure: None,
            delay: None,
            recommendations: Vec::new(),
            context_text: format!("{} context", id),
            calls: Arc::new(AtomicUsize::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_finding(mut self, title: &str, severity: Severity, confidence: f32) -> Self {
        let source = self.id.clone();
        self.findings.push((title.to_string(), source, severity, confidence));
        self
    }

    /// Finding attributed to another source
    pub fn with_foreign_finding(mut self, title: &str, source: &str) -> Self {
        self.findings
            .push((title.to_string(), AgentId::new(source), Severity::Low, 0.5));
        self
    }

    pub fn failing(mut self, kind: ErrorKind, message: &str) -> Self {
        self.failure = Some((kind, message.to_string()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn recommending(mut self, agents: &[&str]) -> Self {
        self.recommendations = agents.iter().map(|a| AgentId::new(a)).collect();
        self
    }

    pub fn with_context(mut self, text: &str) -> Self {
        self.context_text = text.to_string();
        self
    }

    /// Shared call counter, readable after the agent moved into a registry
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    /// Requests this agent received
    pub fn seen(&self) -> Arc<Mutex<Vec<AgentRequest>>> {
        Arc::clone(&self.seen)
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn id(&self) -> AgentId {
        self.id.clone()
    }

    fn description(&self) -> String {
        format!("scripted {}", self.id)
    }

    async fn invoke(&self, request: &AgentRequest) -> AgentResponse {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some((kind, message)) = &self.failure {
            return AgentResponse::failure(self.id.clone(), *kind, message.clone());
        }

        let findings = self
            .findings
            .iter()
            .map(|(title, source, severity, confidence)| {
                Finding::new(
                    title.clone(),
                    format!("{} summary", title),
                    source.clone(),
                    *severity,
                    *confidence,
                )
                .unwrap()
            })
            .collect();
        AgentResponse::success(self.id.clone(), findings, self.context_text.clone())
            .with_recommendations(self.recommendations.clone())
    }
}

/// Registry of scripted agents; every timeout is the given one
pub fn registry_of(agents: Vec<(ScriptedAgent, &[&str])>, timeout: Duration) -> AgentRegistry {
    let mut builder = AgentRegistry::builder();
    for (agent, triggers) in agents {
        builder = builder.with_agent(
            Arc::new(agent),
            triggers.iter().map(|t| t.to_string()).collect(),
            timeout,
        );
    }
    builder.build().unwrap()
}

pub const NO_TRIGGERS: &[&str] = &[];
pub const WEB_TRIGGERS: &[&str] = &["website", "web", "url", "news", "leak", "breach", "cve"];
pub const TELEGRAM_TRIGGERS: &[&str] = &["telegram", "channel", "group", "chat", "message"];

/// Mock LLM client for testing with configurable responses.
#[derive(Clone)]
pub struct MockLLMClient {
    response: String,
    should_fail: bool,
}

impl MockLLMClient {
    /// Create a new mock client that returns the given response.
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            should_fail: false,
        }
    }

    /// Create a mock client that always returns an error.
    pub fn failing() -> Self {
        Self {
            response: String::new(),
            should_fail: true,
        }
    }

    fn reply(&self) -> Result<String> {
        if self.should_fail {
            return Err(AppError::LLM("Mock LLM failure".to_string()));
        }
        Ok(self.response.clone())
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn generate_with_system(&self, _system: &str, _prompt: &str) -> Result<String> {
        self.reply()
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}
