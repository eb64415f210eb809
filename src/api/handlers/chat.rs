use super::models::MODEL_ID;
use super::query::run_query;
use crate::{
    AppState,
    graph::OrchestrationState,
    types::{
        AgentId, AppError, ChatChoice, ChatCompletionRequest, ChatCompletionResponse,
        ChatMessage, MessageRole, QueryRequest, Result, Usage,
    },
};
use axum::{Json, extract::State};
use tracing::debug;
use uuid::Uuid;

/// OpenAI-compatible chat completion
///
/// The last user message is the query; `user` becomes the conversation id.
/// Streaming requests are answered with a single non-streamed completion.
pub async fn chat_completions(
    State(state): State<AppState>,
    Json(payload): Json<ChatCompletionRequest>,
) -> Result<Json<ChatCompletionResponse>> {
    let query = payload
        .last_user_message()
        .ok_or_else(|| AppError::InvalidInput("no user message in request".to_string()))?;

    if payload.stream {
        debug!("Streaming requested; answering with a single completion");
    }

    let mut request = QueryRequest::new(query);
    if let Some(user) = payload.user.as_deref() {
        request = request.with_conversation_id(user);
    }

    let outcome = run_query(&state, request).await?;
    let content = render_chat_content(&outcome);

    Ok(Json(ChatCompletionResponse {
        id: format!("chatcmpl-{}", Uuid::new_v4()),
        object: "chat.completion".to_string(),
        created: chrono::Utc::now().timestamp(),
        model: payload.model.clone().unwrap_or_else(|| MODEL_ID.to_string()),
        choices: vec![ChatChoice {
            index: 0,
            message: ChatMessage {
                role: MessageRole::Assistant,
                content,
            },
            finish_reason: "stop".to_string(),
        }],
        usage: Usage::default(),
    }))
}

/// Report text followed by the agents/findings footer
pub fn render_chat_content(state: &OrchestrationState) -> String {
    let agents = state
        .agents_consulted()
        .iter()
        .map(AgentId::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{}\n\n---\nAgents: {} | Findings: {}",
        state.final_response().unwrap_or_default().trim_end(),
        if agents.is_empty() { "none" } else { agents.as_str() },
        state.findings().len()
    )
}
