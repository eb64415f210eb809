//! HTTP API Handlers and Routes
//!
//! # API Endpoints
//!
//! - `GET /health` - Liveness and registry size
//! - `GET /v1/models` (also `/models`) - OpenAI-compatible model list
//! - `GET /v1/agents` (also `/agents`) - Registered agents with triggers
//! - `POST /v1/chat/completions` (also `/chat/completions`) - OpenAI-compatible
//!   chat; the last user message is orchestrated as a query
//! - `POST /v1/query` - Native query returning the full orchestration outcome

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;
