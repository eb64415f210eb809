//! Report synthesis
//!
//! Merges the collected findings into one ranked report:
//!
//! 1. findings sharing `(title, source_agent)` are collapsed, keeping the
//!    higher confidence (the earlier one on ties)
//! 2. the rest are ordered by severity, then confidence, then the position of
//!    their agent in `agents_consulted`, keeping arrival order otherwise
//! 3. the report is rendered from a fixed template: summary, optional
//!    analysis from a [`ReportPhraser`], the context text each agent returned,
//!    then the findings grouped by severity
//!
//! Synthesis cannot fail: a failing phraser only removes the analysis section.

use super::state::OrchestrationState;
use crate::types::{AgentError, AgentId, Finding, Result, Severity};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;
use tracing::{debug, warn};

/// Optional prose collaborator for the final report
#[async_trait]
pub trait ReportPhraser: Send + Sync {
    /// Short analysis of the ranked findings
    async fn phrase(&self, query: &str, findings: &[Finding], documentation_context: &str)
        -> Result<String>;
}

/// Deduplicate and order findings
pub fn rank_findings(findings: &[Finding], agents_consulted: &[AgentId]) -> Vec<Finding> {
    let mut kept: Vec<Finding> = Vec::with_capacity(findings.len());
    let mut index_of: HashMap<(String, AgentId), usize> = HashMap::new();

    for finding in findings {
        let key = (finding.title().to_string(), finding.source_agent().clone());
        match index_of.get(&key) {
            Some(&i) => {
                if finding.confidence() > kept[i].confidence() {
                    kept[i] = finding.clone();
                }
            }
            None => {
                index_of.insert(key, kept.len());
                kept.push(finding.clone());
            }
        }
    }

    let arrival = |agent: &AgentId| {
        agents_consulted
            .iter()
            .position(|id| id == agent)
            .unwrap_or(usize::MAX)
    };

    // sort_by is stable, so equal keys keep their arrival order
    kept.sort_by(|a, b| {
        b.severity()
            .cmp(&a.severity())
            .then_with(|| {
                b.confidence()
                    .partial_cmp(&a.confidence())
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| arrival(a.source_agent()).cmp(&arrival(b.source_agent())))
    });
    kept
}

/// Render the deterministic report
pub fn render_report(
    query: &str,
    agents_consulted: &[AgentId],
    contexts: &[(AgentId, String)],
    ranked: &[Finding],
    error: Option<&AgentError>,
    analysis: Option<&str>,
) -> String {
    let mut out = String::new();
    let agents = if agents_consulted.is_empty() {
        "none".to_string()
    } else {
        agents_consulted
            .iter()
            .map(AgentId::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };

    let _ = writeln!(out, "# Cyber Threat Intelligence Report\n");
    let _ = writeln!(out, "**Query:** {}\n", query);
    let _ = writeln!(
        out,
        "**Summary:** Consulted {} agent(s) ({}); {} finding(s).\n",
        agents_consulted.len(),
        agents,
        ranked.len()
    );

    if let Some(error) = error {
        let _ = writeln!(
            out,
            "> **Degraded result:** the {} agent failed ({}: {}). Coverage is partial.\n",
            error.agent, error.kind, error.message
        );
    }

    if let Some(analysis) = analysis {
        let _ = writeln!(out, "## Analysis\n\n{}\n", analysis.trim());
    }

    if !contexts.is_empty() {
        let _ = writeln!(out, "## Sources\n");
        for (agent, text) in contexts {
            let _ = writeln!(out, "### {}\n\n{}\n", agent, text);
        }
    }

    if ranked.is_empty() {
        let _ = writeln!(out, "## Findings\n\nNo findings were reported for this query.");
        return out;
    }

    for severity in Severity::DESCENDING {
        let group: Vec<&Finding> = ranked.iter().filter(|f| f.severity() == severity).collect();
        if group.is_empty() {
            continue;
        }
        let _ = writeln!(out, "## {} ({})\n", severity.heading(), group.len());
        for finding in group {
            let _ = writeln!(
                out,
                "- **{}** [{}, confidence {:.2}]",
                finding.title(),
                finding.source_agent(),
                finding.confidence()
            );
            if !finding.summary().is_empty() {
                let _ = writeln!(out, "  {}", finding.summary());
            }
            for (key, value) in finding.metadata() {
                let _ = writeln!(out, "  - {}: {}", key, value);
            }
        }
        out.push('\n');
    }

    out
}

/// Builds the final report for a state
#[derive(Clone, Default)]
pub struct Synthesizer {
    phraser: Option<Arc<dyn ReportPhraser>>,
}

impl Synthesizer {
    /// Template-only synthesizer
    pub fn new() -> Self {
        Self { phraser: None }
    }

    pub fn with_phraser(phraser: Arc<dyn ReportPhraser>) -> Self {
        Self {
            phraser: Some(phraser),
        }
    }

    pub fn has_phraser(&self) -> bool {
        self.phraser.is_some()
    }

    /// Render the report for the current state
    pub async fn synthesize(&self, state: &OrchestrationState) -> String {
        let ranked = rank_findings(state.findings(), state.agents_consulted());
        debug!(
            "Synthesizing {} findings ({} after dedup)",
            state.findings().len(),
            ranked.len()
        );

        let analysis = match &self.phraser {
            Some(phraser) => {
                let phrased = phraser
                    .phrase(
                        state.query(),
                        &ranked,
                        state.documentation_context().unwrap_or_default(),
                    )
                    .await;
                match phrased {
                    Ok(text) if !text.trim().is_empty() => Some(text),
                    Ok(_) => {
                        warn!("Report phraser returned an empty analysis; using template only");
                        None
                    }
                    Err(e) => {
                        warn!("Report phrasing failed, using template only: {}", e);
                        None
                    }
                }
            }
            None => None,
        };

        render_report(
            state.query(),
            state.agents_consulted(),
            state.agent_contexts(),
            &ranked,
            state.error(),
            analysis.as_deref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AgentResponse, AppError, ErrorKind, QueryRequest};

    fn finding(title: &str, agent: &str, severity: Severity, confidence: f32) -> Finding {
        Finding::new(title, format!("{} summary", title), AgentId::new(agent), severity, confidence)
            .unwrap()
    }

    fn ids(names: &[&str]) -> Vec<AgentId> {
        names.iter().map(|n| AgentId::new(n)).collect()
    }

    struct FailingPhraser;

    #[async_trait]
    impl ReportPhraser for FailingPhraser {
        async fn phrase(&self, _: &str, _: &[Finding], _: &str) -> Result<String> {
            Err(AppError::LLM("model offline".to_string()))
        }
    }

    struct EchoPhraser;

    #[async_trait]
    impl ReportPhraser for EchoPhraser {
        async fn phrase(&self, query: &str, findings: &[Finding], _: &str) -> Result<String> {
            Ok(format!("{} findings about {}", findings.len(), query))
        }
    }

    #[test]
    fn test_dedup_keeps_higher_confidence() {
        let findings = vec![
            finding("Same", "web", Severity::High, 0.4),
            finding("Same", "web", Severity::High, 0.9),
            finding("Same", "telegram", Severity::High, 0.1),
        ];
        let ranked = rank_findings(&findings, &ids(&["documentation", "web", "telegram"]));

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].source_agent(), &AgentId::new("web"));
        assert_eq!(ranked[0].confidence(), 0.9);
    }

    #[test]
    fn test_dedup_tie_keeps_first() {
        let first = finding("Same", "web", Severity::Low, 0.5).with_metadata("n", "1");
        let second = finding("Same", "web", Severity::Low, 0.5).with_metadata("n", "2");
        let ranked = rank_findings(&[first, second], &ids(&["web"]));
        assert_eq!(ranked[0].metadata().get("n").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_ordering_severity_confidence_agent() {
        let findings = vec![
            finding("tg-high", "telegram", Severity::High, 0.7),
            finding("doc-info", "documentation", Severity::Info, 1.0),
            finding("web-high", "web", Severity::High, 0.7),
            finding("web-crit", "web", Severity::Critical, 0.1),
            finding("tg-high-conf", "telegram", Severity::High, 0.9),
        ];
        let ranked = rank_findings(&findings, &ids(&["documentation", "web", "telegram"]));
        let titles: Vec<&str> = ranked.iter().map(|f| f.title()).collect();

        assert_eq!(
            titles,
            vec!["web-crit", "tg-high-conf", "web-high", "tg-high", "doc-info"]
        );
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let findings: Vec<Finding> = (0..20)
            .map(|i| {
                finding(
                    &format!("f{}", i % 7),
                    if i % 2 == 0 { "web" } else { "telegram" },
                    Severity::DESCENDING[i % 5],
                    (i % 4) as f32 / 4.0,
                )
            })
            .collect();
        let consulted = ids(&["documentation", "web", "telegram"]);

        let first = rank_findings(&findings, &consulted);
        for _ in 0..5 {
            assert_eq!(rank_findings(&findings, &consulted), first);
        }
    }

    #[test]
    fn test_render_no_findings() {
        let report = render_report("hello", &ids(&["documentation"]), &[], &[], None, None);
        assert!(report.starts_with("# Cyber Threat Intelligence Report"));
        assert!(report.contains("Consulted 1 agent(s) (documentation); 0 finding(s)."));
        assert!(report.contains("No findings were reported for this query."));
        assert!(!report.contains("Degraded"));
    }

    #[test]
    fn test_render_groups_and_degraded_notice() {
        let ranked = vec![
            finding("Crit", "web", Severity::Critical, 0.9).with_metadata("url", "https://x"),
            finding("Info", "documentation", Severity::Info, 0.5),
        ];
        let error = AgentError::new(ErrorKind::Timeout, AgentId::new("telegram"), "no reply in 30s");
        let report = render_report(
            "q",
            &ids(&["documentation", "web", "telegram"]),
            &[],
            &ranked,
            Some(&error),
            None,
        );

        assert!(report.contains("the telegram agent failed (timeout: no reply in 30s)"));
        let critical = report.find("## Critical (1)").unwrap();
        let info = report.find("## Informational (1)").unwrap();
        assert!(critical < info);
        assert!(report.contains("- **Crit** [web, confidence 0.90]"));
        assert!(report.contains("  - url: https://x"));
        assert!(!report.contains("## High"));
        assert!(!report.contains("## Sources"));
    }

    #[test]
    fn test_render_sources_before_findings() {
        let contexts = vec![
            (AgentId::documentation(), "Knowledge base: isolate hosts.".to_string()),
            (AgentId::new("web"), "Checked 5 sources.".to_string()),
        ];
        let ranked = vec![finding("Crit", "web", Severity::Critical, 0.9)];
        let report = render_report(
            "q",
            &ids(&["documentation", "web"]),
            &contexts,
            &ranked,
            None,
            None,
        );

        let sources = report.find("## Sources").unwrap();
        let doc = report.find("### documentation\n\nKnowledge base: isolate hosts.").unwrap();
        let web = report.find("### web\n\nChecked 5 sources.").unwrap();
        let critical = report.find("## Critical (1)").unwrap();
        assert!(sources < doc && doc < web && web < critical);
    }

    fn state_with_findings() -> OrchestrationState {
        let mut state = OrchestrationState::new(QueryRequest::new("ransomware"));
        state.record_response(AgentResponse::success(
            AgentId::documentation(),
            vec![finding("Doc", "documentation", Severity::Info, 0.6)],
            "ctx",
        ));
        state
    }

    #[tokio::test]
    async fn test_phraser_failure_falls_back_to_template() {
        let state = state_with_findings();
        let with_failure = Synthesizer::with_phraser(Arc::new(FailingPhraser))
            .synthesize(&state)
            .await;
        let template = Synthesizer::new().synthesize(&state).await;

        assert_eq!(with_failure, template);
        assert!(!template.contains("## Analysis"));
    }

    #[tokio::test]
    async fn test_phraser_adds_analysis() {
        let report = Synthesizer::with_phraser(Arc::new(EchoPhraser))
            .synthesize(&state_with_findings())
            .await;
        assert!(report.contains("## Analysis\n\n1 findings about ransomware"));
    }
}
