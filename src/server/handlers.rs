use axum::extract::{Query, Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use axum::{Extension, Json};
use serde::Deserialize;

use super::SharedState;
use crate::adapter::{
    GetScoresResponse, ScenarioListResponse, SelectOptionRequest, SelectOptionResponse,
    StartConversationRequest, StartConversationResponse, UpdateScoresResponse,
};
use crate::auth::AuthUser;
use crate::error::AppError;

/// Bearer-token middleware. Resolves the caller and stashes it as a request
/// extension; absence or invalidity yields a uniform 401 on every route.
pub async fn require_bearer(
    State(state): State<SharedState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .and_then(|token| state.verifier.verify(token));

    match user {
        Some(user) => {
            req.extensions_mut().insert(user);
            Ok(next.run(req).await)
        }
        None => Err(AppError::Unauthorized {
            message: "Missing or invalid bearer token".to_string(),
        }),
    }
}

/// `GET /scenarios` - list active scenarios with persona metadata.
pub async fn list_scenarios(
    State(state): State<SharedState>,
    Extension(_user): Extension<AuthUser>,
) -> Result<Json<ScenarioListResponse>, AppError> {
    Ok(Json(state.service.list_scenarios().await?))
}

/// `POST /start-conversation` - create a conversation and return the start
/// node's options.
pub async fn start_conversation(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<StartConversationRequest>,
) -> Result<Json<StartConversationResponse>, AppError> {
    Ok(Json(state.service.start_conversation(&user, req).await?))
}

/// `POST /select-option` - apply one selection, auto-creating the
/// conversation when no id is supplied.
pub async fn select_option(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<SelectOptionRequest>,
) -> Result<Json<SelectOptionResponse>, AppError> {
    Ok(Json(state.service.select_option(&user, req).await?))
}

/// Query parameters of `GET /get-scores`.
#[derive(Debug, Deserialize)]
pub struct GetScoresQuery {
    /// Scenario to report on; omitted for the cross-scenario summary.
    pub scenario_slug: Option<String>,
}

/// `GET /get-scores` - best/average scores and attempt statistics.
pub async fn get_scores(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<GetScoresQuery>,
) -> Result<Json<GetScoresResponse>, AppError> {
    Ok(Json(
        state
            .service
            .get_scores(&user, query.scenario_slug.as_deref())
            .await?,
    ))
}

/// Request body of `POST /update-scores`.
#[derive(Debug, Deserialize)]
pub struct UpdateScoresRequest {
    /// The completed conversation to fold into the aggregate.
    pub conversation_id: Option<String>,
}

/// `POST /update-scores` - fold a completed conversation into the per-user
/// aggregate. Idempotent per conversation.
pub async fn update_scores(
    State(state): State<SharedState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<UpdateScoresRequest>,
) -> Result<Json<UpdateScoresResponse>, AppError> {
    Ok(Json(
        state
            .service
            .update_scores(&user, req.conversation_id)
            .await?,
    ))
}
