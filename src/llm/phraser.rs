//! LLM-backed report phrasing

use super::client::LLMClient;
use crate::graph::synthesizer::ReportPhraser;
use crate::types::{AppError, Finding, Result};
use async_trait::async_trait;
use std::fmt::Write;
use std::sync::Arc;

/// Findings beyond this count are left out of the prompt
const MAX_PROMPT_FINDINGS: usize = 25;

const SYSTEM_PROMPT: &str = "You are a cyber threat intelligence analyst. \
Write a short analysis (at most two paragraphs) of the findings you are given. \
Only use the findings and background provided; do not invent CVE identifiers, \
sources or dates. Do not repeat the findings list.";

/// [`ReportPhraser`] that asks an [`LLMClient`] for the analysis section
pub struct LlmReportPhraser {
    client: Arc<dyn LLMClient>,
}

impl LlmReportPhraser {
    pub fn new(client: Arc<dyn LLMClient>) -> Self {
        Self { client }
    }

    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }
}

/// User prompt for a set of ranked findings
pub fn build_prompt(query: &str, findings: &[Finding], documentation_context: &str) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "Analyst question: {}\n", query);

    if !documentation_context.trim().is_empty() {
        let _ = writeln!(prompt, "Background:\n{}\n", documentation_context.trim());
    }

    if findings.is_empty() {
        let _ = writeln!(prompt, "No findings were collected.");
    } else {
        let _ = writeln!(prompt, "Findings (most severe first):");
        for finding in findings.iter().take(MAX_PROMPT_FINDINGS) {
            let _ = writeln!(
                prompt,
                "- [{}] {} ({}, confidence {:.2}): {}",
                finding.severity(),
                finding.title(),
                finding.source_agent(),
                finding.confidence(),
                finding.summary()
            );
        }
        if findings.len() > MAX_PROMPT_FINDINGS {
            let _ = writeln!(
                prompt,
                "- ... and {} more",
                findings.len() - MAX_PROMPT_FINDINGS
            );
        }
    }
    prompt
}

#[async_trait]
impl ReportPhraser for LlmReportPhraser {
    async fn phrase(
        &self,
        query: &str,
        findings: &[Finding],
        documentation_context: &str,
    ) -> Result<String> {
        let prompt = build_prompt(query, findings, documentation_context);
        let text = self.client.generate_with_system(SYSTEM_PROMPT, &prompt).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::LLM("model returned an empty analysis".to_string()));
        }
        Ok(text.to_string())
    }
}
