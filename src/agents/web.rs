//! Web intelligence agent
//!
//! Checks a list of security news sites, advisories and CVE databases and
//! turns the relevant ones into findings. Page access goes through the
//! [`WebFeed`] trait; [`HttpWebFeed`] is the live implementation.

use super::documentation::extract_cve_ids;
use super::{Agent, AgentRequest, FetchError};
use crate::types::{AgentId, AgentResponse, AppError, ErrorKind, Finding, Result, Severity};
use crate::utils::toml_config::{SourceKind, WebSourceConfig};
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const RELEVANCE_THRESHOLD: f32 = 0.5;
const MEDIUM_THRESHOLD: f32 = 0.7;
const CVE_MATCH_CONFIDENCE: f32 = 0.95;
const MAX_HEADLINES: usize = 10;
const MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

/// What was extracted from one source page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageSnapshot {
    pub title: Option<String>,
    pub headlines: Vec<String>,
    /// CVE identifiers mentioned anywhere on the page
    pub cve_ids: Vec<String>,
}

impl PageSnapshot {
    /// One-line description used in finding summaries
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(title) = &self.title {
            parts.push(title.clone());
        }
        if !self.headlines.is_empty() {
            let top: Vec<&str> = self.headlines.iter().take(2).map(String::as_str).collect();
            parts.push(format!("headlines: {}", top.join("; ")));
        }
        if !self.cve_ids.is_empty() {
            let top: Vec<&str> = self.cve_ids.iter().take(3).map(String::as_str).collect();
            parts.push(format!("recent CVEs: {}", top.join(", ")));
        }
        if parts.is_empty() {
            "No summary".to_string()
        } else {
            parts.join(" | ")
        }
    }
}

/// Access to web sources
#[async_trait]
pub trait WebFeed: Send + Sync {
    async fn fetch(&self, source: &WebSourceConfig) -> std::result::Result<PageSnapshot, FetchError>;
}

/// Fetches pages over HTTP and extracts title, headlines and CVE ids
pub struct HttpWebFeed {
    client: reqwest::Client,
}

impl HttpWebFeed {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("CyberSense/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebFeed for HttpWebFeed {
    async fn fetch(&self, source: &WebSourceConfig) -> std::result::Result<PageSnapshot, FetchError> {
        let response = self.client.get(&source.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Unavailable(format!(
                "HTTP {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let body = response.bytes().await?;
        if body.len() > MAX_BODY_SIZE {
            return Err(FetchError::Parse(format!(
                "response too large: {} bytes",
                body.len()
            )));
        }

        parse_page(&String::from_utf8_lossy(&body))
    }
}

/// Extract the interesting parts of an HTML page
pub fn parse_page(html: &str) -> std::result::Result<PageSnapshot, FetchError> {
    use scraper::{Html, Selector};

    let document = Html::parse_document(html);
    let title_selector =
        Selector::parse("title").map_err(|e| FetchError::Parse(format!("selector: {}", e)))?;
    let headline_selector =
        Selector::parse("h1, h2, h3").map_err(|e| FetchError::Parse(format!("selector: {}", e)))?;

    let title = document
        .select(&title_selector)
        .next()
        .map(|el| clean_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty());

    let mut headlines: Vec<String> = Vec::new();
    for element in document.select(&headline_selector) {
        let text = clean_whitespace(&element.text().collect::<Vec<_>>().join(" "));
        if !text.is_empty() && !headlines.contains(&text) {
            headlines.push(text);
        }
        if headlines.len() == MAX_HEADLINES {
            break;
        }
    }

    let page_text = document.root_element().text().collect::<Vec<_>>().join(" ");

    Ok(PageSnapshot {
        title,
        headlines,
        cve_ids: extract_cve_ids(&page_text),
    })
}

fn clean_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Relevance of a source to a query, in `[0, 1]`
pub fn relevance(query: &str, kind: SourceKind) -> f32 {
    let query = query.to_lowercase();
    if query.contains("cve") && kind == SourceKind::CveDatabase {
        0.9
    } else if ["news", "recent", "latest"].iter().any(|w| query.contains(w)) {
        0.7
    } else if query.contains("alert") && kind == SourceKind::Government {
        0.85
    } else {
        0.5
    }
}

/// Web intelligence agent
pub struct WebAgent {
    feed: Arc<dyn WebFeed>,
    sources: Vec<WebSourceConfig>,
}

impl WebAgent {
    pub fn new(feed: Arc<dyn WebFeed>, sources: Vec<WebSourceConfig>) -> Self {
        Self { feed, sources }
    }

    fn analyze(
        &self,
        query: &str,
        results: &[(&WebSourceConfig, PageSnapshot)],
    ) -> Result<Vec<Finding>> {
        let query_cves = extract_cve_ids(query);
        let mut findings = Vec::new();

        for (source, page) in results {
            let score = relevance(query, source.kind);
            if score > RELEVANCE_THRESHOLD {
                let severity = if score > MEDIUM_THRESHOLD {
                    Severity::Medium
                } else {
                    Severity::Low
                };
                findings.push(
                    Finding::new(
                        format!("Web Intel: {}", source.name),
                        format!(
                            "Relevant information found from {}: {}",
                            source.name,
                            page.summary()
                        ),
                        self.id(),
                        severity,
                        score,
                    )?
                    .with_metadata("url", source.url.clone())
                    .with_metadata("source_kind", format!("{:?}", source.kind).to_lowercase()),
                );
            }

            for cve in query_cves.iter().filter(|cve| page.cve_ids.contains(cve)) {
                findings.push(
                    Finding::new(
                        format!("{} referenced by {}", cve, source.name),
                        format!("{} lists {} among its current entries.", source.name, cve),
                        self.id(),
                        Severity::High,
                        CVE_MATCH_CONFIDENCE,
                    )?
                    .with_metadata("cve", cve.clone())
                    .with_metadata("url", source.url.clone()),
                );
            }
        }

        Ok(findings)
    }
}

#[async_trait]
impl Agent for WebAgent {
    fn id(&self) -> AgentId {
        AgentId::new("web")
    }

    fn description(&self) -> String {
        "Monitors websites for security news, leaked data, and threat intelligence".to_string()
    }

    async fn invoke(&self, request: &AgentRequest) -> AgentResponse {
        let preview: String = request.query.chars().take(100).collect();
        info!("Web agent processing: {}", preview);

        if self.sources.is_empty() {
            return AgentResponse::success(self.id(), Vec::new(), "No web sources configured.");
        }

        let fetches = join_all(self.sources.iter().map(|source| async move {
            debug!("Checking source: {}", source.name);
            (source, self.feed.fetch(source).await)
        }));
        let outcomes = tokio::select! {
            biased;
            _ = request.cancel.cancelled() => {
                return AgentResponse::failure(self.id(), ErrorKind::Cancelled, "web fetch cancelled");
            }
            outcomes = fetches => outcomes,
        };

        let mut pages = Vec::new();
        let mut context = format!("Web intelligence for: {}\n", request.query);
        let mut last_error: Option<FetchError> = None;
        for (source, outcome) in outcomes {
            match outcome {
                Ok(page) => {
                    context.push_str(&format!(
                        "- {} ({}): {}\n",
                        source.name,
                        source.url,
                        page.summary()
                    ));
                    pages.push((source, page));
                }
                Err(e) => {
                    warn!("Error fetching {}: {}", source.name, e);
                    context.push_str(&format!("- {} ({}): failed, {}\n", source.name, source.url, e));
                    last_error = Some(e);
                }
            }
        }

        if pages.is_empty() {
            if let Some(e) = last_error {
                return AgentResponse::failure(
                    self.id(),
                    e.kind(),
                    format!("all {} web sources failed, last: {}", self.sources.len(), e),
                );
            }
        }

        match self.analyze(&request.query, &pages) {
            Ok(findings) => {
                context.push_str(&format!(
                    "Sources checked: {}, findings: {}\n",
                    pages.len(),
                    findings.len()
                ));
                AgentResponse::success(self.id(), findings, context)
            }
            Err(e) => AgentResponse::failure(self.id(), ErrorKind::ParseError, e.to_string()),
        }
    }
}
