//! Documentation agent
//!
//! Always the first step of every query. It classifies the question, pulls
//! background material from the knowledge base and recommends follow-up
//! agents through structured hints.

use super::{keyword_matches, tokens, Agent, AgentRequest};
use crate::rag::DocumentRetriever;
use crate::types::{AgentId, AgentResponse, ErrorKind, Finding, Severity};
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

const VULNERABILITY_TERMS: [&str; 4] = ["vulnerability", "vuln", "exploit", "attack"];
const THREAT_TERMS: [&str; 4] = ["threat", "malware", "ransomware", "phishing"];
const COMPLIANCE_TERMS: [&str; 5] = ["compliance", "gdpr", "hipaa", "pci", "iso"];
/// Threat-actor activity worth checking in monitored channels
const CHANNEL_HINT_TERMS: [&str; 5] = ["ransomware", "malware", "phishing", "apt", "botnet"];

/// Matches CVE identifiers such as `CVE-2024-12345`
pub fn cve_pattern() -> &'static Regex {
    static CVE: OnceLock<Regex> = OnceLock::new();
    CVE.get_or_init(|| Regex::new(r"(?i)\bCVE-\d{4}-\d{4,}\b").expect("valid CVE regex"))
}

/// Uppercased CVE identifiers of a text, deduplicated in order of appearance
pub fn extract_cve_ids(text: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for m in cve_pattern().find_iter(text) {
        let id = m.as_str().to_uppercase();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    CveLookup,
    Vulnerability,
    Threat,
    Compliance,
    General,
}

impl QueryKind {
    pub fn label(&self) -> &'static str {
        match self {
            QueryKind::CveLookup => "CVE/Vulnerability Lookup",
            QueryKind::Vulnerability => "Vulnerability Analysis",
            QueryKind::Threat => "Threat Intelligence",
            QueryKind::Compliance => "Compliance/Standards",
            QueryKind::General => "General Security Query",
        }
    }
}

/// Result of inspecting the query text
#[derive(Debug, Clone, PartialEq)]
pub struct QueryAnalysis {
    pub kind: QueryKind,
    pub cve_ids: Vec<String>,
    pub mentions_threat_actor: bool,
}

pub fn analyze_query(query: &str) -> QueryAnalysis {
    let lowered = query.to_lowercase();
    let toks = tokens(query);
    let any = |terms: &[&str]| terms.iter().any(|t| keyword_matches(t, &lowered, &toks));

    let cve_ids = extract_cve_ids(query);
    let kind = if !cve_ids.is_empty() || toks.iter().any(|t| t == "cve" || t == "cves") {
        QueryKind::CveLookup
    } else if any(&VULNERABILITY_TERMS) {
        QueryKind::Vulnerability
    } else if any(&THREAT_TERMS) {
        QueryKind::Threat
    } else if any(&COMPLIANCE_TERMS) {
        QueryKind::Compliance
    } else {
        QueryKind::General
    };

    QueryAnalysis {
        kind,
        cve_ids,
        mentions_threat_actor: any(&CHANNEL_HINT_TERMS)
            || toks.iter().any(|t| is_apt_designation(t)),
    }
}

/// Tracked group names such as `apt29` or `apt41`
fn is_apt_designation(token: &str) -> bool {
    token
        .strip_prefix("apt")
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

/// Documentation agent backed by a [`DocumentRetriever`]
pub struct DocumentationAgent {
    retriever: Arc<dyn DocumentRetriever>,
}

impl DocumentationAgent {
    pub fn new(retriever: Arc<dyn DocumentRetriever>) -> Self {
        Self { retriever }
    }

    fn recommendations(analysis: &QueryAnalysis) -> Vec<AgentId> {
        let mut hints = Vec::new();
        if !analysis.cve_ids.is_empty() {
            hints.push(AgentId::new("web"));
        }
        if analysis.mentions_threat_actor {
            hints.push(AgentId::new("telegram"));
        }
        hints
    }
}

#[async_trait]
impl Agent for DocumentationAgent {
    fn id(&self) -> AgentId {
        AgentId::documentation()
    }

    fn description(&self) -> String {
        "Retrieves and analyzes security documentation, CVE references and technical guidance"
            .to_string()
    }

    async fn invoke(&self, request: &AgentRequest) -> AgentResponse {
        let preview: String = request.query.chars().take(100).collect();
        info!("Documentation agent processing: {}", preview);

        let analysis = analyze_query(&request.query);

        let retrieval = tokio::select! {
            biased;
            _ = request.cancel.cancelled() => {
                return AgentResponse::failure(self.id(), ErrorKind::Cancelled, "retrieval cancelled");
            }
            result = self.retriever.retrieve(&request.query) => result,
        };
        let retrieval = match retrieval {
            Ok(retrieval) => retrieval,
            Err(e) => {
                warn!("Document retrieval failed: {}", e);
                return AgentResponse::failure(
                    self.id(),
                    ErrorKind::SourceUnavailable,
                    format!("document retrieval failed: {}", e),
                );
            }
        };

        let mut context = format!("Query type: {}\n", analysis.kind.label());
        if !analysis.cve_ids.is_empty() {
            context.push_str(&format!("Detected CVEs: {}\n", analysis.cve_ids.join(", ")));
        }
        context.push_str("\nRetrieved context:\n");
        context.push_str(&retrieval.text);

        let mut findings = Vec::new();
        if matches!(analysis.kind, QueryKind::CveLookup | QueryKind::Vulnerability) {
            let subject: String = request.query.chars().take(50).collect();
            let finding = Finding::new(
                format!("Documentation Reference: {}", subject),
                "Relevant security documentation was found for this query.",
                self.id(),
                Severity::Info,
                retrieval.confidence.clamp(0.0, 1.0),
            );
            match finding {
                Ok(mut finding) => {
                    if !analysis.cve_ids.is_empty() {
                        finding = finding.with_metadata("cve_ids", analysis.cve_ids.join(","));
                    }
                    findings.push(finding.with_metadata("query_type", analysis.kind.label()));
                }
                Err(e) => {
                    return AgentResponse::failure(self.id(), ErrorKind::ParseError, e.to_string())
                }
            }
        }

        AgentResponse::success(self.id(), findings, context)
            .with_recommendations(Self::recommendations(&analysis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::Retrieval;
    use crate::types::{AppError, Result};

    struct FixedRetriever(Option<Retrieval>);

    #[async_trait]
    impl DocumentRetriever for FixedRetriever {
        async fn retrieve(&self, _query: &str) -> Result<Retrieval> {
            self.0
                .clone()
                .ok_or_else(|| AppError::Internal("index offline".to_string()))
        }
    }

    fn agent(confidence: f32) -> DocumentationAgent {
        DocumentationAgent::new(Arc::new(FixedRetriever(Some(Retrieval {
            text: "[kb.md] Apache advisory".to_string(),
            confidence,
        }))))
    }

    #[test]
    fn test_extract_cve_ids() {
        let ids = extract_cve_ids("see cve-2021-44228 and CVE-2024-12345, again CVE-2021-44228");
        assert_eq!(ids, vec!["CVE-2021-44228", "CVE-2024-12345"]);
        assert!(extract_cve_ids("CVE-21-1").is_empty());
    }

    #[test]
    fn test_analyze_query_kinds() {
        assert_eq!(analyze_query("What CVE vulnerabilities affect Apache?").kind, QueryKind::CveLookup);
        assert_eq!(analyze_query("latest exploit for nginx").kind, QueryKind::Vulnerability);
        assert_eq!(analyze_query("ransomware trends").kind, QueryKind::Threat);
        assert_eq!(analyze_query("GDPR requirements").kind, QueryKind::Compliance);
        assert_eq!(analyze_query("hello there").kind, QueryKind::General);
        assert!(analyze_query("apt groups targeting banks").mentions_threat_actor);
        assert!(!analyze_query("aptitude test results").mentions_threat_actor);
    }

    #[test]
    fn test_numbered_apt_groups_are_threat_actors() {
        assert!(analyze_query("APT29 activity").mentions_threat_actor);
        assert!(analyze_query("what is apt41 doing").mentions_threat_actor);
        assert!(!analyze_query("aptx codec").mentions_threat_actor);
    }

    #[tokio::test]
    async fn test_cve_query_yields_reference_finding() {
        let response = agent(0.8)
            .invoke(&AgentRequest::new("What CVE vulnerabilities affect Apache?"))
            .await;

        assert!(response.is_success());
        assert_eq!(response.findings().len(), 1);
        let finding = &response.findings()[0];
        assert!(finding.title().starts_with("Documentation Reference: "));
        assert_eq!(finding.severity(), Severity::Info);
        assert_eq!(finding.confidence(), 0.8);
        assert!(response.context_text().contains("Apache advisory"));
        assert!(response.recommended_agents().is_empty());
    }

    #[tokio::test]
    async fn test_general_query_has_no_findings() {
        let response = agent(0.3).invoke(&AgentRequest::new("security awareness")).await;
        assert!(response.is_success());
        assert!(response.findings().is_empty());
        assert!(response.context_text().contains("General Security Query"));
    }

    #[tokio::test]
    async fn test_hints_from_cve_ids_and_threat_terms() {
        let response = agent(0.5)
            .invoke(&AgentRequest::new("Is CVE-2023-4966 used by ransomware crews?"))
            .await;
        assert_eq!(
            response.recommended_agents(),
            [AgentId::new("web"), AgentId::new("telegram")]
        );
        assert_eq!(
            response.findings()[0].metadata().get("cve_ids").map(String::as_str),
            Some("CVE-2023-4966")
        );
    }

    #[tokio::test]
    async fn test_retrieval_failure_is_source_unavailable() {
        let agent = DocumentationAgent::new(Arc::new(FixedRetriever(None)));
        let response = agent.invoke(&AgentRequest::new("cve")).await;
        assert_eq!(
            response.error().map(|e| e.kind),
            Some(ErrorKind::SourceUnavailable)
        );
        assert!(response.findings().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_retrieval() {
        let request = AgentRequest::new("cve");
        request.cancel.cancel();
        let response = agent(0.5).invoke(&request).await;
        assert_eq!(response.error().map(|e| e.kind), Some(ErrorKind::Cancelled));
    }
}
