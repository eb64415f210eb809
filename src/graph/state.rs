//! Per-query orchestration state
//!
//! One [`OrchestrationState`] exists per query. It is owned by the executor
//! for the lifetime of the query and only changes through the methods below,
//! which keep these properties:
//!
//! - `agents_consulted` and `pending_agents` are disjoint
//! - an agent appears in `agents_consulted` at most once
//! - `documentation_context` is written once
//! - `agent_contexts` holds at most one entry per agent, in arrival order
//! - the first recorded error is kept
//! - once complete, `final_response` is set and nothing is pending

use crate::agents::AgentRequest;
use crate::types::{AgentError, AgentId, AgentResponse, Finding, QueryRequest};
use std::collections::{BTreeMap, VecDeque};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct OrchestrationState {
    query: String,
    conversation_id: String,
    context: BTreeMap<String, String>,
    agents_consulted: Vec<AgentId>,
    pending_agents: VecDeque<AgentId>,
    documentation_context: Option<String>,
    documentation_hints: Vec<AgentId>,
    agent_contexts: Vec<(AgentId, String)>,
    planned: bool,
    steps: usize,
    findings: Vec<Finding>,
    final_response: Option<String>,
    is_complete: bool,
    error: Option<AgentError>,
}

impl OrchestrationState {
    pub fn new(request: QueryRequest) -> Self {
        let conversation_id = request
            .conversation_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Self {
            query: request.query,
            conversation_id,
            context: request.context,
            agents_consulted: Vec::new(),
            pending_agents: VecDeque::new(),
            documentation_context: None,
            documentation_hints: Vec::new(),
            agent_contexts: Vec::new(),
            planned: false,
            steps: 0,
            findings: Vec::new(),
            final_response: None,
            is_complete: false,
            error: None,
        }
    }

    // ============= Accessors =============

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn context(&self) -> &BTreeMap<String, String> {
        &self.context
    }

    pub fn agents_consulted(&self) -> &[AgentId] {
        &self.agents_consulted
    }

    pub fn has_consulted(&self, id: &AgentId) -> bool {
        self.agents_consulted.contains(id)
    }

    /// Pending agents in planned order
    pub fn pending_agents(&self) -> impl Iterator<Item = &AgentId> {
        self.pending_agents.iter()
    }

    pub fn next_pending(&self) -> Option<&AgentId> {
        self.pending_agents.front()
    }

    pub fn pending_len(&self) -> usize {
        self.pending_agents.len()
    }

    pub fn documentation_context(&self) -> Option<&str> {
        self.documentation_context.as_deref()
    }

    /// Agents the documentation step recommended
    pub fn documentation_hints(&self) -> &[AgentId] {
        &self.documentation_hints
    }

    /// Non-empty context text of each consulted agent, in arrival order
    pub fn agent_contexts(&self) -> &[(AgentId, String)] {
        &self.agent_contexts
    }

    /// Whether fan-out planning has happened
    pub fn is_planned(&self) -> bool {
        self.planned
    }

    /// Router decisions taken so far
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn final_response(&self) -> Option<&str> {
        self.final_response.as_deref()
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    pub fn error(&self) -> Option<&AgentError> {
        self.error.as_ref()
    }

    // ============= Transitions =============

    /// Fix the fan-out plan; only the first call has an effect
    ///
    /// Agents already consulted or listed twice are skipped.
    pub fn plan(&mut self, agents: Vec<AgentId>) {
        if self.planned {
            return;
        }
        self.planned = true;
        for id in agents {
            if !self.has_consulted(&id) && !self.pending_agents.contains(&id) {
                self.pending_agents.push_back(id);
            }
        }
    }

    /// Merge one agent response
    pub fn record_response(&mut self, response: AgentResponse) {
        let (agent_id, findings, context_text, hints, error) = response.into_parts();

        if !self.has_consulted(&agent_id) {
            self.agents_consulted.push(agent_id.clone());
            if !context_text.trim().is_empty() {
                self.agent_contexts
                    .push((agent_id.clone(), context_text.trim().to_string()));
            }
        }
        self.pending_agents.retain(|id| id != &agent_id);
        self.findings.extend(findings);

        if agent_id.is_documentation() && self.documentation_context.is_none() {
            self.documentation_context = Some(context_text);
            self.documentation_hints = hints;
        }

        if let Some(error) = error {
            self.record_error(error);
        }
    }

    /// Keep the first error; later ones are ignored
    pub fn record_error(&mut self, error: AgentError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    pub(crate) fn note_step(&mut self) {
        self.steps += 1;
    }

    /// Queue an agent without the checks `plan` applies
    #[cfg(test)]
    pub(crate) fn push_pending_unchecked(&mut self, id: AgentId) {
        self.pending_agents.push_back(id);
    }

    /// Remove an agent from the pending queue without recording a response
    pub(crate) fn drop_pending(&mut self, id: &AgentId) {
        self.pending_agents.retain(|pending| pending != id);
    }

    /// Store the final report and mark the query complete
    pub fn complete(&mut self, report: String) {
        if self.is_complete {
            return;
        }
        self.pending_agents.clear();
        self.final_response = Some(report);
        self.is_complete = true;
    }

    /// Snapshot handed to an agent
    pub fn agent_request(&self, cancel: CancellationToken) -> AgentRequest {
        AgentRequest {
            query: self.query.clone(),
            conversation_id: self.conversation_id.clone(),
            context: self.context.clone(),
            documentation_context: self.documentation_context.clone().unwrap_or_default(),
            previous_findings: self.findings.iter().map(|f| f.title().to_string()).collect(),
            agents_consulted: self.agents_consulted.clone(),
            cancel,
        }
    }

    #[allow(clippy::type_complexity)]
    pub(crate) fn into_outcome(
        self,
    ) -> (
        String,
        Option<String>,
        Vec<Finding>,
        Vec<AgentId>,
        bool,
        Option<AgentError>,
    ) {
        (
            self.conversation_id,
            self.final_response,
            self.findings,
            self.agents_consulted,
            self.is_complete,
            self.error,
        )
    }
}
