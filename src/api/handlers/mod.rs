//! API request handlers.

/// Agent registry listing.
pub mod agents;
/// OpenAI-compatible chat completions.
pub mod chat;
/// Liveness endpoint.
pub mod health;
/// OpenAI-compatible model listing.
pub mod models;
/// Native orchestration endpoint.
pub mod query;
