use crate::{AppState, types::AgentInfo};
use axum::{Json, extract::State};

/// Registered agents in planning order
pub async fn list_agents(State(state): State<AppState>) -> Json<Vec<AgentInfo>> {
    Json(state.registry.infos())
}
