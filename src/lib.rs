//! # CyberSense - Agentic Cyber Threat Intelligence
//!
//! CyberSense answers security questions by running a small graph of
//! intelligence agents and merging what they find into one ranked report.
//!
//! ## Overview
//!
//! Every query follows the same path:
//!
//! 1. the **documentation** agent runs first and retrieves background from
//!    the local knowledge base
//! 2. the **router** plans the fan-out agents (`web`, `telegram`) from the
//!    query keywords and the documentation agent's hints
//! 3. the planned agents run, one by one or concurrently
//! 4. the **synthesizer** deduplicates and ranks the findings and renders a
//!    report, optionally with an LLM-written analysis
//!
//! Agent failures degrade the report instead of failing the query.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use cybersense::{AppState, CyberSenseConfig, QueryRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! let state = AppState::from_config(CyberSenseConfig::default()).await?;
//! let outcome = state
//!     .executor
//!     .run(QueryRequest::new("What CVE vulnerabilities affect Apache?"), CancellationToken::new())
//!     .await?;
//! println!("{}", outcome.final_response().unwrap_or_default());
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ollama` | Ollama report phrasing (default) |
//!
//! ## Modules
//!
//! - [`agents`] - Agent capability, registry and the built-in agents
//! - [`graph`] - Orchestration state, router, executor and synthesizer
//! - [`rag`] - Local knowledge base with BM25 retrieval
//! - [`llm`] - LLM client used for report phrasing
//! - [`api`] - REST API handlers and routes
//! - [`types`] - Common types and error handling

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// Intelligence agents and their registry.
pub mod agents;
/// HTTP API handlers and routes.
pub mod api;
/// Command-line interface.
pub mod cli;
/// Orchestration graph.
pub mod graph;
/// LLM provider clients.
pub mod llm;
/// Document retrieval for the documentation agent.
pub mod rag;
/// Core types (requests, responses, errors).
pub mod types;
/// Configuration utilities.
pub mod utils;

// Re-export commonly used types
pub use agents::{Agent, AgentRegistry, AgentRegistryBuilder, AgentRequest};
pub use graph::{GraphExecutor, NextStep, OrchestrationState, Synthesizer};
pub use llm::{LLMClient, Provider};
pub use types::{AppError, QueryRequest, QueryResponse, Result};
pub use utils::toml_config::CyberSenseConfig;

use crate::llm::LlmReportPhraser;
use crate::rag::{KeywordRetriever, TextChunker, ingest::KnowledgeBase};
use axum::Router;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Validated configuration
    pub config: Arc<CyberSenseConfig>,
    /// Immutable agent registry
    pub registry: Arc<AgentRegistry>,
    /// Executor shared by all queries
    pub executor: Arc<GraphExecutor>,
}

impl AppState {
    /// Assemble the state from explicit parts
    pub fn new(config: CyberSenseConfig, executor: GraphExecutor) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::clone(executor.registry()),
            executor: Arc::new(executor),
        }
    }

    /// Build knowledge base, agents and synthesizer from configuration
    pub async fn from_config(config: CyberSenseConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| AppError::Configuration(e.to_string()))?;

        let chunker = TextChunker::new(config.rag.chunk_size, config.rag.chunk_overlap);
        let kb = KnowledgeBase::from_dir(&config.rag.documents_dir, &chunker)?;
        info!(
            "Knowledge base loaded from {}: {} chunks",
            config.rag.documents_dir.display(),
            kb.len()
        );
        let retriever = Arc::new(KeywordRetriever::new(Arc::new(kb), config.rag.top_k));

        let registry = Arc::new(AgentRegistry::from_config(&config, retriever)?);
        let synthesizer = build_synthesizer(&config).await;
        let executor = GraphExecutor::new(registry, synthesizer)
            .with_parallel_fan_out(config.orchestration.parallel_fan_out);

        Ok(Self::new(config, executor))
    }
}

/// Template-only unless `[llm]` is enabled and its client can be created
async fn build_synthesizer(config: &CyberSenseConfig) -> Synthesizer {
    let provider = match Provider::from_config(&config.llm) {
        Ok(Some(provider)) => provider,
        Ok(None) => return Synthesizer::new(),
        Err(e) => {
            warn!("LLM disabled: {}", e);
            return Synthesizer::new();
        }
    };

    match provider.create_client(config.llm.timeout()).await {
        Ok(client) => {
            info!(
                "Report phrasing via {} ({})",
                provider.name(),
                client.model_name()
            );
            Synthesizer::with_phraser(Arc::new(LlmReportPhraser::new(Arc::from(client))))
        }
        Err(e) => {
            warn!("Could not create {} client, using template reports: {}", provider.name(), e);
            Synthesizer::new()
        }
    }
}

/// HTTP application with tracing and CORS layers
pub fn build_app(state: AppState) -> Router {
    api::routes::create_router()
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
