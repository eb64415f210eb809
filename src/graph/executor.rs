//! Graph executor
//!
//! Drives the route/invoke loop for one query until the synthesizer has
//! produced a report. Agent failures are folded into the state and still end
//! in a (degraded) report; only an internal inconsistency aborts the query.

use super::router::{plan_fan_out, route, NextStep};
use super::state::OrchestrationState;
use super::synthesizer::Synthesizer;
use crate::agents::registry::AgentRegistry;
use crate::types::{
    AgentError, AgentId, AgentResponse, AppError, ErrorKind, QueryRequest, Result,
};
use futures::future::join_all;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Identity used when the executor itself records an error
const EXECUTOR_ID: &str = "executor";

#[derive(Clone)]
pub struct GraphExecutor {
    registry: Arc<AgentRegistry>,
    synthesizer: Synthesizer,
    parallel_fan_out: bool,
}

impl GraphExecutor {
    pub fn new(registry: Arc<AgentRegistry>, synthesizer: Synthesizer) -> Self {
        Self {
            registry,
            synthesizer,
            parallel_fan_out: false,
        }
    }

    /// Dispatch all planned agents concurrently instead of one by one
    pub fn with_parallel_fan_out(mut self, enabled: bool) -> Self {
        self.parallel_fan_out = enabled;
        self
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn parallel_fan_out(&self) -> bool {
        self.parallel_fan_out
    }

    /// Run one query to completion
    ///
    /// Returns the completed state, or [`AppError::InternalInconsistency`]
    /// when the agents or the loop itself misbehave in a way no report can
    /// be built from.
    pub async fn run(
        &self,
        request: QueryRequest,
        cancel: CancellationToken,
    ) -> Result<OrchestrationState> {
        let state = OrchestrationState::new(request);
        info!(
            conversation_id = %state.conversation_id(),
            "Starting orchestration for query: {}",
            state.query()
        );
        self.drive(state, cancel).await
    }

    /// Step an existing state until the synthesizer has run
    pub(crate) async fn drive(
        &self,
        mut state: OrchestrationState,
        cancel: CancellationToken,
    ) -> Result<OrchestrationState> {
        let budget = 2 + self.registry.len();

        for step in 1..=budget {
            if cancel.is_cancelled() && state.error().is_none() {
                warn!("Query cancelled before step {}", step);
                state.record_error(AgentError::new(
                    ErrorKind::Cancelled,
                    AgentId::new(EXECUTOR_ID),
                    "query cancelled by caller",
                ));
            }

            state.note_step();
            let next = route(&state);
            debug!("Step {}: {}", step, next);

            match next {
                NextStep::Synthesize => {
                    let report = self.synthesizer.synthesize(&state).await;
                    state.complete(report);
                    info!(
                        conversation_id = %state.conversation_id(),
                        agents = state.agents_consulted().len(),
                        findings = state.findings().len(),
                        degraded = state.error().is_some(),
                        "Orchestration complete"
                    );
                    return Ok(state);
                }
                NextStep::Documentation => {
                    let response = self
                        .dispatch(&AgentId::documentation(), &state, &cancel)
                        .await?;
                    state.record_response(response);

                    if state.error().is_none() {
                        let plan = plan_fan_out(
                            state.query(),
                            state.documentation_hints(),
                            state.agents_consulted(),
                            &self.registry,
                        );
                        debug!("Planned fan-out: {:?}", plan);
                        state.plan(plan);
                    }
                }
                NextStep::Agent(id) if state.has_consulted(&id) => {
                    warn!("Agent {} was already consulted; skipping", id);
                    state.drop_pending(&id);
                }
                NextStep::Agent(id) => {
                    if self.parallel_fan_out {
                        self.dispatch_pending(&mut state, &cancel).await?;
                    } else {
                        let response = self.dispatch(&id, &state, &cancel).await?;
                        state.record_response(response);
                    }
                }
            }
        }

        Err(inconsistency(format!(
            "orchestration did not finish within {} steps",
            budget
        )))
    }

    /// Run every pending agent concurrently; results are merged in planned order
    async fn dispatch_pending(
        &self,
        state: &mut OrchestrationState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let planned: Vec<AgentId> = state.pending_agents().cloned().collect();
        info!("Dispatching {} agents concurrently", planned.len());

        let snapshot = &*state;
        let responses = join_all(
            planned
                .iter()
                .map(|id| self.dispatch(id, snapshot, cancel)),
        )
        .await;

        for response in responses {
            state.record_response(response?);
        }
        Ok(())
    }

    /// Invoke one agent with its timeout, racing the cancellation token
    async fn dispatch(
        &self,
        id: &AgentId,
        state: &OrchestrationState,
        cancel: &CancellationToken,
    ) -> Result<AgentResponse> {
        let entry = self
            .registry
            .get(id)
            .ok_or_else(|| inconsistency(format!("routed to unregistered agent '{}'", id)))?;

        let child = cancel.child_token();
        let request = state.agent_request(child.clone());
        let agent = Arc::clone(entry.agent());
        let timeout = entry.timeout();

        debug!("Invoking agent {} (timeout {:?})", id, timeout);
        let invocation = AssertUnwindSafe(async move { agent.invoke(&request).await }).catch_unwind();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                child.cancel();
                warn!("Agent {} cancelled", id);
                AgentResponse::failure(id.clone(), ErrorKind::Cancelled, "query cancelled by caller")
            }
            outcome = tokio::time::timeout(timeout, invocation) => match outcome {
                Ok(Ok(response)) => response,
                Ok(Err(_)) => {
                    warn!("Agent {} panicked", id);
                    AgentResponse::failure(id.clone(), ErrorKind::SourceUnavailable, "agent panicked")
                }
                Err(_) => {
                    child.cancel();
                    warn!("Agent {} timed out after {:?}", id, timeout);
                    AgentResponse::failure(
                        id.clone(),
                        ErrorKind::Timeout,
                        format!("no response within {}s", timeout.as_secs_f32()),
                    )
                }
            }
        };

        self.check_response(id, &response)?;
        if let Some(err) = response.error() {
            warn!("Agent {} failed: {}", id, err);
        } else {
            debug!(
                "Agent {} returned {} findings",
                id,
                response.findings().len()
            );
        }
        Ok(response)
    }

    fn check_response(&self, expected: &AgentId, response: &AgentResponse) -> Result<()> {
        if response.agent_id() != expected {
            return Err(inconsistency(format!(
                "agent '{}' answered as '{}'",
                expected,
                response.agent_id()
            )));
        }
        if let Some(err) = response.error() {
            if err.kind.is_fatal() {
                return Err(inconsistency(format!("agent '{}' reported: {}", expected, err.message)));
            }
        }
        for finding in response.findings() {
            if !self.registry.contains(finding.source_agent()) {
                return Err(inconsistency(format!(
                    "agent '{}' returned a finding from unregistered source '{}'",
                    expected,
                    finding.source_agent()
                )));
            }
        }
        Ok(())
    }
}

fn inconsistency(message: String) -> AppError {
    error!("Internal inconsistency: {}", message);
    AppError::InternalInconsistency(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{Agent, AgentRequest};
    use crate::types::{Finding, Severity};
    use async_trait::async_trait;
    use std::time::Duration;

    struct Fixed {
        id: &'static str,
        answer_as: &'static str,
        findings: usize,
    }

    #[async_trait]
    impl Agent for Fixed {
        fn id(&self) -> AgentId {
            AgentId::new(self.id)
        }

        fn description(&self) -> String {
            format!("fixed {}", self.id)
        }

        async fn invoke(&self, _request: &AgentRequest) -> AgentResponse {
            let findings = (0..self.findings)
                .map(|i| {
                    Finding::new(
                        format!("{} #{}", self.id, i),
                        "s",
                        AgentId::new(self.answer_as),
                        Severity::Low,
                        0.5,
                    )
                    .unwrap()
                })
                .collect();
            AgentResponse::success(AgentId::new(self.answer_as), findings, "ctx")
        }
    }

    #[derive(Default)]
    struct Counting {
        calls: Arc<std::sync::atomic::AtomicUsize>,
    }

    #[async_trait]
    impl Agent for Counting {
        fn id(&self) -> AgentId {
            AgentId::new("web")
        }

        fn description(&self) -> String {
            "counting".to_string()
        }

        async fn invoke(&self, _request: &AgentRequest) -> AgentResponse {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            AgentResponse::success(AgentId::new("web"), vec![], "")
        }
    }

    struct Panics;

    #[async_trait]
    impl Agent for Panics {
        fn id(&self) -> AgentId {
            AgentId::new("web")
        }

        fn description(&self) -> String {
            String::new()
        }

        async fn invoke(&self, _request: &AgentRequest) -> AgentResponse {
            panic!("boom")
        }
    }

    fn fixed(id: &'static str, findings: usize) -> Arc<dyn Agent> {
        Arc::new(Fixed {
            id,
            answer_as: id,
            findings,
        })
    }

    fn executor(web: Arc<dyn Agent>) -> GraphExecutor {
        let registry = AgentRegistry::builder()
            .with_agent(fixed("documentation", 1), vec![], Duration::from_secs(1))
            .with_agent(web, vec!["web".to_string()], Duration::from_secs(1))
            .build()
            .unwrap();
        GraphExecutor::new(Arc::new(registry), Synthesizer::new())
    }

    #[tokio::test]
    async fn test_runs_documentation_then_planned_agent() {
        let state = executor(fixed("web", 2))
            .run(QueryRequest::new("web search"), CancellationToken::new())
            .await
            .unwrap();

        assert!(state.is_complete());
        assert_eq!(
            state.agents_consulted(),
            [AgentId::documentation(), AgentId::new("web")]
        );
        assert_eq!(state.findings().len(), 3);
        assert!(state.error().is_none());
    }

    #[tokio::test]
    async fn test_panic_becomes_source_unavailable() {
        let state = executor(Arc::new(Panics))
            .run(QueryRequest::new("web"), CancellationToken::new())
            .await
            .unwrap();

        let error = state.error().unwrap();
        assert_eq!(error.kind, ErrorKind::SourceUnavailable);
        assert_eq!(error.agent, AgentId::new("web"));
        assert!(state.final_response().unwrap().contains("Degraded result"));
    }

    #[tokio::test]
    async fn test_mismatched_agent_id_is_fatal() {
        let impostor = Arc::new(Fixed {
            id: "web",
            answer_as: "telegram",
            findings: 0,
        });
        let result = executor(impostor)
            .run(QueryRequest::new("web"), CancellationToken::new())
            .await;

        assert!(matches!(result, Err(AppError::InternalInconsistency(_))));
    }

    fn documented_state(query: &str) -> OrchestrationState {
        let mut state = OrchestrationState::new(QueryRequest::new(query));
        state.record_response(AgentResponse::success(AgentId::documentation(), vec![], "ctx"));
        state
    }

    #[tokio::test]
    async fn test_already_consulted_agent_is_not_invoked_again() {
        let web = Arc::new(Counting::default());
        let calls = Arc::clone(&web.calls);
        let mut state = documented_state("web");
        state.plan(vec![AgentId::new("web")]);
        state.record_response(AgentResponse::success(AgentId::new("web"), vec![], "done"));
        state.push_pending_unchecked(AgentId::new("web"));

        let state = executor(web)
            .drive(state, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert!(state.is_complete());
        assert_eq!(
            state.agents_consulted(),
            [AgentId::documentation(), AgentId::new("web")]
        );
    }

    #[tokio::test]
    async fn test_unregistered_pending_agent_is_fatal() {
        let mut state = documented_state("darkweb");
        state.plan(vec![AgentId::new("darkweb")]);

        let result = executor(fixed("web", 0))
            .drive(state, CancellationToken::new())
            .await;

        match result {
            Err(AppError::InternalInconsistency(message)) => {
                assert!(message.contains("unregistered agent 'darkweb'"))
            }
            other => panic!("expected an inconsistency, got {:?}", other.map(|s| s.steps())),
        }
    }

    #[tokio::test]
    async fn test_step_count_sequential_and_parallel() {
        let sequential = executor(fixed("web", 1))
            .run(QueryRequest::new("web"), CancellationToken::new())
            .await
            .unwrap();
        // documentation, web, synthesize
        assert_eq!(sequential.steps(), 3);

        let parallel = executor(fixed("web", 1))
            .with_parallel_fan_out(true)
            .run(QueryRequest::new("web"), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(parallel.steps(), 3);

        let unplanned = executor(fixed("web", 1))
            .run(QueryRequest::new("nothing relevant"), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(unplanned.steps(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_synthesizes_immediately() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let state = executor(fixed("web", 1))
            .run(QueryRequest::new("web"), cancel)
            .await
            .unwrap();

        assert!(state.is_complete());
        assert!(state.agents_consulted().is_empty());
        assert_eq!(state.error().unwrap().kind, ErrorKind::Cancelled);
        assert_eq!(state.error().unwrap().agent, AgentId::new(EXECUTOR_ID));
    }
}
