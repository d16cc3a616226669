use crate::services::{Indexer, Orchestrator};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use pdf_qa_core::{new_session_id, AnswerError, SourceSnippet, DEFAULT_SESSION_ID};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub indexer: Arc<Indexer>,
    pub collection: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub sources: Vec<SourceSnippet>,
    pub context_used: usize,
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ClearParams {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusMessage {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub documents_indexed: usize,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub documents_indexed: usize,
    pub active_sessions: usize,
    pub collection: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route("/clear-history", post(clear_history))
        .route("/stats", get(stats))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let (status, documents_indexed) = match state.indexer.indexed_count().await {
        Ok(count) => ("healthy", count),
        Err(err) => {
            warn!(error = %err, "store count failed during health check");
            ("degraded", 0)
        }
    };

    Json(HealthResponse {
        status: status.to_string(),
        documents_indexed,
        timestamp: Utc::now().to_rfc3339(),
    })
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if request.message.trim().is_empty() {
        return Err(error_body(StatusCode::BAD_REQUEST, "Message cannot be empty"));
    }

    let session_id = request
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(new_session_id);

    match state.orchestrator.answer(&session_id, &request.message).await {
        Ok(answer) => Ok(Json(ChatResponse {
            answer: answer.answer,
            sources: answer.sources,
            context_used: answer.context_used,
            session_id,
        })),
        Err(AnswerError::EmptyQuestion) => {
            Err(error_body(StatusCode::BAD_REQUEST, "Message cannot be empty"))
        }
        Err(err) => {
            error!(session_id = %session_id, error = %err, "chat request failed");
            Err(error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error processing request: {err}"),
            ))
        }
    }
}

async fn clear_history(
    State(state): State<AppState>,
    Query(params): Query<ClearParams>,
) -> Json<StatusMessage> {
    let session_id = params
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SESSION_ID.to_string());
    state.orchestrator.clear_history(&session_id).await;

    Json(StatusMessage {
        status: "success".to_string(),
        message: format!("History cleared for session {session_id}"),
    })
}

async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let documents_indexed = state.indexer.indexed_count().await.map_err(|err| {
        error!(error = %err, "store count failed");
        error_body(StatusCode::SERVICE_UNAVAILABLE, err.to_string())
    })?;

    Ok(Json(StatsResponse {
        documents_indexed,
        active_sessions: state.orchestrator.sessions().len().await,
        collection: state.collection.clone(),
    }))
}

fn error_body(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            message: message.into(),
        }),
    )
}
