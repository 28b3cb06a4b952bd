use axum::http::StatusCode;
use axum::{Json, Router, routing::{get, patch, post}};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::{net::SocketAddr, sync::Arc};
use uuid::Uuid;

use crate::artifacts;
use crate::elicitation::{AmbiguityFinding, ElicitationEngine, FourWPrompts, detect_ambiguity, four_w_prompts};
use crate::gateway::{FALLBACK_MESSAGE, OllamaGateway};
use crate::session::{RequirementRecord, Role, SessionSummary};
use crate::store::{ConversationStore, StoreError};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ConversationStore>,
    pub engine: Arc<ElicitationEngine>,
    pub gateway: Arc<OllamaGateway>,
    pub specifications_dir: PathBuf,
}

fn map_store_error(err: StoreError) -> StatusCode {
    match err {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub id: Uuid,
}

async fn create_session(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<CreateSessionResponse> {
    let id = state.store.create().await;
    Json(CreateSessionResponse { id })
}

async fn delete_session(
    axum::extract::State(state): axum::extract::State<AppState>,
    axum::extract::Path(id): axum::extract::Path<Uuid>,
) -> StatusCode {
    if state.store.delete(id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn session_summary(
    axum::extract::State(state): axum::extract::State<AppState>,
    axum::extract::Path(id): axum::extract::Path<Uuid>,
) -> Result<Json<SessionSummary>, StatusCode> {
    let summary = state.store.summary(id).await.map_err(map_store_error)?;
    Ok(Json(summary))
}

#[derive(Debug, Serialize)]
pub struct RestoreResponse {
    pub restored: bool,
}

async fn restore_session(
    axum::extract::State(state): axum::extract::State<AppState>,
    axum::extract::Path(id): axum::extract::Path<Uuid>,
) -> Json<RestoreResponse> {
    let restored = state.store.restore(id).await;
    Json(RestoreResponse { restored })
}

#[derive(Debug, Deserialize)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

async fn patch_project(
    axum::extract::State(state): axum::extract::State<AppState>,
    axum::extract::Path(id): axum::extract::Path<Uuid>,
    Json(body): Json<ProjectPatch>,
) -> Result<Json<SessionSummary>, StatusCode> {
    state
        .store
        .update_project(id, body.name, body.description)
        .await
        .map_err(map_store_error)?;
    let summary = state.store.summary(id).await.map_err(map_store_error)?;
    Ok(Json(summary))
}

async fn add_requirement(
    axum::extract::State(state): axum::extract::State<AppState>,
    axum::extract::Path(id): axum::extract::Path<Uuid>,
    Json(record): Json<RequirementRecord>,
) -> Result<StatusCode, StatusCode> {
    state
        .store
        .add_requirement(id, record)
        .await
        .map_err(map_store_error)?;
    Ok(StatusCode::CREATED)
}

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub response: String,
}

/// One dialogue turn: store the user message, run the engine against the
/// stored history, store the reply. Gateway failures degrade to the fixed
/// fallback message so the conversation survives connectivity loss.
async fn chat(
    axum::extract::State(state): axum::extract::State<AppState>,
    axum::extract::Path(id): axum::extract::Path<Uuid>,
    Json(body): Json<ChatBody>,
) -> Result<Json<ChatReply>, StatusCode> {
    let message = body.message.trim();
    if message.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    // The engine expects the current message to be in the store already.
    state
        .store
        .append(id, Role::User, message)
        .await
        .map_err(map_store_error)?;
    let history = state.store.get(id).await.map_err(map_store_error)?;

    let response = match state.engine.turn(message, &history).await {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(%id, %err, "model call failed, degrading to fallback");
            FALLBACK_MESSAGE.to_string()
        }
    };

    state
        .store
        .append(id, Role::Assistant, response.clone())
        .await
        .map_err(map_store_error)?;
    if let Err(err) = state.store.snapshot(id).await {
        tracing::warn!(%id, %err, "snapshot failed");
    }

    Ok(Json(ChatReply { response }))
}

#[derive(Debug, Serialize)]
pub struct SpecificationResponse {
    pub specification: String,
    pub filename: String,
}

async fn generate_specification(
    axum::extract::State(state): axum::extract::State<AppState>,
    axum::extract::Path(id): axum::extract::Path<Uuid>,
) -> Result<Json<SpecificationResponse>, StatusCode> {
    let history = state.store.get(id).await.map_err(map_store_error)?;
    if history.len() < 2 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let specification = state
        .engine
        .generate_document(&history)
        .await
        .map_err(|err| {
            tracing::warn!(%id, %err, "specification generation failed");
            StatusCode::BAD_GATEWAY
        })?;

    let path = artifacts::write_specification(&state.specifications_dir, id, &specification)
        .map_err(|err| {
            tracing::error!(%id, %err, "failed to write specification artifact");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(SpecificationResponse {
        specification,
        filename: path.to_string_lossy().into_owned(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct AmbiguityBody {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct AmbiguityResponse {
    pub findings: Vec<AmbiguityFinding>,
}

async fn analyze_ambiguity(Json(body): Json<AmbiguityBody>) -> Json<AmbiguityResponse> {
    Json(AmbiguityResponse { findings: detect_ambiguity(&body.text) })
}

#[derive(Debug, Deserialize)]
pub struct FourWBody {
    pub requirement: String,
}

async fn analyze_four_w(Json(body): Json<FourWBody>) -> Json<FourWPrompts> {
    Json(four_w_prompts(&body.requirement))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_reachable: bool,
    pub timestamp: chrono::DateTime<Utc>,
}

async fn health(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        model_reachable: state.gateway.check_connection().await,
        timestamp: Utc::now(),
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/sessions", post(create_session))
        .route("/v1/sessions/:id", axum::routing::delete(delete_session))
        .route("/v1/sessions/:id/summary", get(session_summary))
        .route("/v1/sessions/:id/restore", post(restore_session))
        .route("/v1/sessions/:id/project", patch(patch_project))
        .route("/v1/sessions/:id/requirements", post(add_requirement))
        .route("/v1/sessions/:id/chat", post(chat))
        .route("/v1/sessions/:id/specification", post(generate_specification))
        .route("/v1/analysis/ambiguity", post(analyze_ambiguity))
        .route("/v1/analysis/four-w", post(analyze_four_w))
        .route("/v1/health", get(health))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "requirements assistant listening");
    axum::serve(listener, app).await?;
    Ok(())
}
