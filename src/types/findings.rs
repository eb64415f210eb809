//! Findings and agent responses
//!
//! These are the data shapes produced by agents and consumed by the
//! synthesizer. A [`Finding`] is immutable once built; an [`AgentResponse`]
//! either carries findings or an [`AgentError`], never both.

use super::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============= Agent Identifiers =============

/// Identifier of a registered agent (`documentation`, `web`, `telegram`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    /// Name of the agent that always runs first
    pub const DOCUMENTATION: &'static str = "documentation";

    /// Create an identifier; names are normalized to trimmed lowercase
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_lowercase())
    }

    /// The documentation agent identifier
    pub fn documentation() -> Self {
        Self(Self::DOCUMENTATION.to_string())
    }

    pub fn is_documentation(&self) -> bool {
        self.0 == Self::DOCUMENTATION
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

// ============= Severity =============

/// Severity of a finding, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// All severities, most severe first
    pub const DESCENDING: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Heading used when grouping findings in a report
    pub fn heading(&self) -> &'static str {
        match self {
            Severity::Info => "Informational",
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "info" | "informational" => Ok(Severity::Info),
            "low" => Ok(Severity::Low),
            "medium" | "moderate" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(AppError::InvalidInput(format!(
                "Unknown severity: {}. Use: info, low, medium, high, critical",
                other
            ))),
        }
    }
}

// ============= Findings =============

/// One discrete piece of intelligence reported by an agent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    title: String,
    summary: String,
    source_agent: AgentId,
    severity: Severity,
    confidence: f32,
    metadata: BTreeMap<String, String>,
}

impl Finding {
    /// Build a finding, rejecting an empty title or a confidence outside `[0, 1]`
    pub fn new(
        title: impl Into<String>,
        summary: impl Into<String>,
        source_agent: AgentId,
        severity: Severity,
        confidence: f32,
    ) -> Result<Self> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Finding title must not be empty".to_string(),
            ));
        }
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(AppError::InvalidInput(format!(
                "Finding confidence must be within [0, 1], got {}",
                confidence
            )));
        }

        Ok(Self {
            title,
            summary: summary.into(),
            source_agent,
            severity,
            confidence,
            metadata: BTreeMap::new(),
        })
    }

    /// Attach an opaque metadata entry (CVE id, URL, channel id, ...)
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn source_agent(&self) -> &AgentId {
        &self.source_agent
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }
}

// ============= Errors =============

/// Failure taxonomy shared by agents and the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SourceUnavailable,
    Timeout,
    ParseError,
    Cancelled,
    InternalInconsistency,
}

impl ErrorKind {
    /// Whether this kind must abort the request instead of degrading the report
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorKind::InternalInconsistency)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::SourceUnavailable => "source unavailable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ParseError => "parse error",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::InternalInconsistency => "internal inconsistency",
        };
        f.write_str(name)
    }
}

/// A typed failure attributed to the agent that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{agent}: {kind} ({message})")]
pub struct AgentError {
    pub kind: ErrorKind,
    pub agent: AgentId,
    pub message: String,
}

impl AgentError {
    pub fn new(kind: ErrorKind, agent: AgentId, message: impl Into<String>) -> Self {
        Self {
            kind,
            agent,
            message: message.into(),
        }
    }
}

// ============= Agent Responses =============

/// What an agent returns for one invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentResponse {
    agent_id: AgentId,
    findings: Vec<Finding>,
    context_text: String,
    recommended_agents: Vec<AgentId>,
    error: Option<AgentError>,
}

impl AgentResponse {
    /// A successful response carrying findings (possibly none)
    pub fn success(agent_id: AgentId, findings: Vec<Finding>, context_text: impl Into<String>) -> Self {
        Self {
            agent_id,
            findings,
            context_text: context_text.into(),
            recommended_agents: Vec::new(),
            error: None,
        }
    }

    /// A failed response; it never carries findings
    pub fn failure(agent_id: AgentId, kind: ErrorKind, message: impl Into<String>) -> Self {
        let error = AgentError::new(kind, agent_id.clone(), message);
        Self {
            agent_id,
            findings: Vec::new(),
            context_text: String::new(),
            recommended_agents: Vec::new(),
            error: Some(error),
        }
    }

    /// Structured hint naming agents this response recommends consulting next
    pub fn with_recommendations(mut self, agents: Vec<AgentId>) -> Self {
        if self.error.is_none() {
            self.recommended_agents = agents;
        }
        self
    }

    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn context_text(&self) -> &str {
        &self.context_text
    }

    pub fn recommended_agents(&self) -> &[AgentId] {
        &self.recommended_agents
    }

    pub fn error(&self) -> Option<&AgentError> {
        self.error.as_ref()
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub(crate) fn into_parts(self) -> (AgentId, Vec<Finding>, String, Vec<AgentId>, Option<AgentError>) {
        (
            self.agent_id,
            self.findings,
            self.context_text,
            self.recommended_agents,
            self.error,
        )
    }
}
