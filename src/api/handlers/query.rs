use crate::{
    AppState,
    graph::OrchestrationState,
    types::{AppError, QueryRequest, QueryResponse, Result},
};
use axum::{Json, extract::State};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Run a query through the orchestration graph
pub async fn query(
    State(state): State<AppState>,
    Json(payload): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    let outcome = run_query(&state, payload).await?;
    Ok(Json(QueryResponse::from(outcome)))
}

/// Execute one query on its own task
///
/// The task's cancellation token is dropped together with this future, so a
/// client that disconnects cancels its in-flight agents. When the request
/// timeout elapses the token is cancelled and the partial report returned.
pub(crate) async fn run_query(state: &AppState, request: QueryRequest) -> Result<OrchestrationState> {
    if request.query.trim().is_empty() {
        return Err(AppError::InvalidInput("query must not be empty".to_string()));
    }

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let executor = state.executor.clone();
    let token = cancel.clone();
    let mut handle = tokio::spawn(async move { executor.run(request, token).await });

    let timeout = state.config.orchestration.request_timeout();
    let joined = tokio::select! {
        joined = &mut handle => joined,
        _ = tokio::time::sleep(timeout) => {
            warn!("Query exceeded {:?}; cancelling outstanding agents", timeout);
            cancel.cancel();
            handle.await
        }
    };

    joined.map_err(|e| AppError::Internal(format!("orchestration task failed: {}", e)))?
}
