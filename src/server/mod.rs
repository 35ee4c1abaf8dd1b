//! HTTP server module.
//!
//! This module provides:
//! - The axum router exposing the conversation contract
//! - Bearer-token middleware applying a uniform 401 to every route
//! - Shared application state management
//! - The error-to-status mapping at the network boundary

mod handlers;

pub use handlers::*;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::{debug, error};

use crate::adapter::ConversationService;
use crate::auth::TokenVerifier;
use crate::config::Config;
use crate::error::{AppError, EngineError, StorageError};
use crate::storage::SqliteStorage;

/// Application state shared across handlers.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// SQLite storage backend.
    pub storage: SqliteStorage,
    /// The conversation service handling every endpoint.
    pub service: ConversationService,
    /// Bearer-token verifier.
    pub verifier: Arc<dyn TokenVerifier>,
}

impl AppState {
    /// Create new application state
    pub fn new(config: Config, storage: SqliteStorage, verifier: Arc<dyn TokenVerifier>) -> Self {
        let service = ConversationService::new(storage.clone());
        Self {
            config,
            storage,
            service,
            verifier,
        }
    }
}

/// Shared application state handle
pub type SharedState = Arc<AppState>;

/// Build the application router with authentication applied to every route.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/scenarios", get(handlers::list_scenarios))
        .route("/start-conversation", post(handlers::start_conversation))
        .route("/select-option", post(handlers::select_option))
        .route("/get-scores", get(handlers::get_scores))
        .route("/update-scores", post(handlers::update_scores))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::require_bearer,
        ))
        .with_state(state)
}

fn status_code(err: &AppError) -> StatusCode {
    match err {
        AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
        AppError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
        AppError::Engine(engine) => match engine {
            EngineError::InvalidSelection { .. } | EngineError::AlreadyCompleted => {
                StatusCode::BAD_REQUEST
            }
            EngineError::Integrity { .. } | EngineError::VariantNotFound { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        },
        AppError::Storage(storage) => match storage {
            StorageError::ScenarioNotFound { .. }
            | StorageError::ConversationNotFound { .. }
            | StorageError::NodeNotFound { .. } => StatusCode::NOT_FOUND,
            StorageError::Conflict { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
        AppError::Config { .. } | AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_code(&self);
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            debug!(error = %self, status = %status, "Request rejected");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_code(&AppError::Unauthorized {
                message: "no token".into()
            }),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_code(&AppError::InvalidRequest {
                message: "bad tone".into()
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_code(&AppError::Engine(EngineError::AlreadyCompleted)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_code(&AppError::Engine(EngineError::Integrity {
                message: "dangling".into()
            })),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_code(&AppError::Storage(StorageError::ConversationNotFound {
                conversation_id: "c1".into()
            })),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_code(&AppError::Storage(StorageError::Conflict {
                conversation_id: "c1".into(),
                message: "raced".into()
            })),
            StatusCode::CONFLICT
        );
    }
}
