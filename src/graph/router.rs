//! Routing decisions
//!
//! [`route`] is a pure function of the state: it never mutates anything and
//! returns the same step for the same state. [`plan_fan_out`] chooses the
//! agents that follow the documentation step.

use super::state::OrchestrationState;
use crate::agents::registry::AgentRegistry;
use crate::agents::{keyword_matches, tokens};
use crate::types::AgentId;
use std::fmt;

/// The next thing the executor should do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep {
    Documentation,
    Agent(AgentId),
    Synthesize,
}

impl fmt::Display for NextStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NextStep::Documentation => f.write_str("documentation"),
            NextStep::Agent(id) => write!(f, "{}", id),
            NextStep::Synthesize => f.write_str("synthesize"),
        }
    }
}

/// Decide the next step; the first matching rule wins
///
/// 1. an error is recorded: synthesize
/// 2. documentation not consulted yet: documentation
/// 3. agents pending: the first one in planned order
/// 4. otherwise: synthesize
pub fn route(state: &OrchestrationState) -> NextStep {
    if state.error().is_some() {
        return NextStep::Synthesize;
    }
    if !state.has_consulted(&AgentId::documentation()) {
        return NextStep::Documentation;
    }
    match state.next_pending() {
        Some(id) => NextStep::Agent(id.clone()),
        None => NextStep::Synthesize,
    }
}

/// Agents to run after documentation, in registry order
///
/// An agent is chosen when one of its trigger keywords occurs in the query,
/// or when the documentation step recommended it. Hints naming unknown or
/// already consulted agents are ignored.
pub fn plan_fan_out(
    query: &str,
    hints: &[AgentId],
    consulted: &[AgentId],
    registry: &AgentRegistry,
) -> Vec<AgentId> {
    let lowered = query.to_lowercase();
    let query_tokens = tokens(query);

    registry
        .fan_out()
        .filter(|entry| !consulted.contains(entry.id()))
        .filter(|entry| {
            hints.contains(entry.id())
                || entry
                    .triggers()
                    .iter()
                    .any(|kw| keyword_matches(kw, &lowered, &query_tokens))
        })
        .map(|entry| entry.id().clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{Agent, AgentRequest};
    use crate::types::{AgentResponse, ErrorKind, QueryRequest};
    use async_trait::async_trait;
    use rstest::rstest;
    use std::sync::Arc;
    use std::time::Duration;

    struct Noop(&'static str);

    #[async_trait]
    impl Agent for Noop {
        fn id(&self) -> AgentId {
            AgentId::new(self.0)
        }

        fn description(&self) -> String {
            String::new()
        }

        async fn invoke(&self, _request: &AgentRequest) -> AgentResponse {
            AgentResponse::success(self.id(), vec![], "")
        }
    }

    fn registry() -> AgentRegistry {
        let triggers = |words: &[&str]| words.iter().map(|w| w.to_string()).collect();
        AgentRegistry::builder()
            .with_agent(Arc::new(Noop("documentation")), vec![], Duration::from_secs(1))
            .with_agent(
                Arc::new(Noop("web")),
                triggers(&["website", "web", "url", "news", "leak", "breach", "cve"]),
                Duration::from_secs(1),
            )
            .with_agent(
                Arc::new(Noop("telegram")),
                triggers(&["telegram", "channel", "group", "chat", "message", "zero-day"]),
                Duration::from_secs(1),
            )
            .build()
            .unwrap()
    }

    fn state_after_docs(query: &str) -> OrchestrationState {
        let mut state = OrchestrationState::new(QueryRequest::new(query));
        state.record_response(AgentResponse::success(AgentId::documentation(), vec![], ""));
        state
    }

    #[test]
    fn test_documentation_first() {
        let state = OrchestrationState::new(QueryRequest::new("anything at all"));
        assert_eq!(route(&state), NextStep::Documentation);
    }

    #[test]
    fn test_error_short_circuits_before_documentation() {
        let mut state = OrchestrationState::new(QueryRequest::new("q"));
        state.record_response(AgentResponse::failure(
            AgentId::new("web"),
            ErrorKind::Cancelled,
            "cancelled",
        ));
        assert_eq!(route(&state), NextStep::Synthesize);
    }

    #[test]
    fn test_pending_in_planned_order_then_synthesize() {
        let mut state = state_after_docs("q");
        state.plan(vec![AgentId::new("telegram"), AgentId::new("web")]);

        assert_eq!(route(&state), NextStep::Agent(AgentId::new("telegram")));
        state.record_response(AgentResponse::success(AgentId::new("telegram"), vec![], ""));
        assert_eq!(route(&state), NextStep::Agent(AgentId::new("web")));
        state.record_response(AgentResponse::success(AgentId::new("web"), vec![], ""));
        assert_eq!(route(&state), NextStep::Synthesize);
    }

    #[test]
    fn test_route_is_pure() {
        let mut state = state_after_docs("q");
        state.plan(vec![AgentId::new("web")]);
        let first = route(&state);
        let second = route(&state);
        assert_eq!(first, second);
        assert_eq!(state.pending_len(), 1);
    }

    #[test]
    fn test_error_stops_pending_agents() {
        let mut state = state_after_docs("q");
        state.plan(vec![AgentId::new("web"), AgentId::new("telegram")]);
        state.record_response(AgentResponse::failure(
            AgentId::new("web"),
            ErrorKind::Timeout,
            "slow",
        ));
        assert_eq!(route(&state), NextStep::Synthesize);
    }

    #[rstest]
    #[case("What CVE vulnerabilities affect Apache?", &[], &["web"])]
    #[case("Any leaks in telegram channels?", &[], &["web", "telegram"])]
    #[case("Explain defense in depth", &[], &[])]
    #[case("Explain defense in depth", &["telegram"], &["telegram"])]
    #[case("news on the zero-day", &[], &["web", "telegram"])]
    #[case("webinar schedule", &[], &[])]
    #[case("anything", &["darkweb", "documentation"], &[])]
    fn test_plan_fan_out(
        #[case] query: &str,
        #[case] hints: &[&str],
        #[case] expected: &[&str],
    ) {
        let hints: Vec<AgentId> = hints.iter().map(|h| AgentId::new(h)).collect();
        let expected: Vec<AgentId> = expected.iter().map(|e| AgentId::new(e)).collect();
        let plan = plan_fan_out(query, &hints, &[AgentId::documentation()], &registry());
        assert_eq!(plan, expected);
    }

    #[test]
    fn test_plan_skips_consulted() {
        let consulted = vec![AgentId::documentation(), AgentId::new("web")];
        let plan = plan_fan_out("cve on telegram", &[], &consulted, &registry());
        assert_eq!(plan, vec![AgentId::new("telegram")]);
    }

    #[test]
    fn test_next_step_display() {
        assert_eq!(NextStep::Documentation.to_string(), "documentation");
        assert_eq!(NextStep::Agent(AgentId::new("web")).to_string(), "web");
        assert_eq!(NextStep::Synthesize.to_string(), "synthesize");
    }
}
