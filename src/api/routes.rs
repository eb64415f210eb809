use crate::AppState;
use crate::api::handlers::{agents, chat, health, models, query};
use axum::{
    Router,
    routing::{get, post},
};

/// All API routes; OpenAI-style endpoints are served with and without `/v1`
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/v1/models", get(models::list_models))
        .route("/models", get(models::list_models))
        .route("/v1/agents", get(agents::list_agents))
        .route("/agents", get(agents::list_agents))
        .route("/v1/chat/completions", post(chat::chat_completions))
        .route("/chat/completions", post(chat::chat_completions))
        .route("/v1/query", post(query::query))
}
