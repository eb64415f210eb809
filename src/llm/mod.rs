//! LLM provider clients
//!
//! The model is an optional collaborator of the synthesizer: it phrases the
//! analysis section of a report. Providers are enabled via Cargo features:
//! - `ollama` - Local Ollama server (default)

/// Core LLM client trait and provider selection.
pub mod client;
/// Report phrasing on top of an [`LLMClient`].
pub mod phraser;

#[cfg(feature = "ollama")]
pub mod ollama;

pub use client::{LLMClient, Provider};
pub use phraser::LlmReportPhraser;
