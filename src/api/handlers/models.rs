use crate::types::{ModelInfo, ModelList};
use axum::Json;

/// Model id advertised to OpenAI-compatible clients
pub const MODEL_ID: &str = "cybersense";

pub async fn list_models() -> Json<ModelList> {
    Json(ModelList {
        object: "list".to_string(),
        data: vec![ModelInfo {
            id: MODEL_ID.to_string(),
            object: "model".to_string(),
            created: 0,
            owned_by: "cybersense".to_string(),
        }],
    })
}
