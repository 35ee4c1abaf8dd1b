//! # Convo Trainer
//!
//! A branching-dialogue engine for scored conversation-training scenarios.
//! A trainee picks a customer-service scenario, reads the persona's opening
//! message, and repeatedly chooses from a small set of reply options. Each
//! choice is scored along three axes (clarity, friendliness, empathy) and
//! determines the next line of dialogue until a terminal node is reached,
//! at which point the attempt is classified into an outcome tier.
//!
//! The same conversation contract exists in two forms:
//!
//! - **In-memory**: [`engine::ConversationSession`] walks a validated
//!   [`scenario::ScenarioGraph`] synchronously, with no I/O.
//! - **Server-authoritative**: [`adapter::ConversationService`] runs the
//!   identical step semantics against relational rows in SQLite, with
//!   per-conversation write serialization and an idempotent score-aggregate
//!   update.
//!
//! ## Architecture
//!
//! ```text
//! HTTP Client → axum handlers → ConversationService → SQLite (state)
//!                                      ↕ (same StepOutcome shape)
//!                              ConversationSession → ScenarioGraph (memory)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use convo_trainer::{Config, AppState};
//! use convo_trainer::auth::StaticTokenVerifier;
//! use convo_trainer::server::router;
//! use convo_trainer::storage::SqliteStorage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = SqliteStorage::new(&config.database).await?;
//!     let verifier = Arc::new(StaticTokenVerifier::new(config.auth.tokens.clone()));
//!     let state = Arc::new(AppState::new(config, storage, verifier));
//!     let listener = tokio::net::TcpListener::bind(&state.config.server.bind_addr).await?;
//!     axum::serve(listener, router(state)).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Server-authoritative conversation service over relational storage.
pub mod adapter;
/// Bearer-token verification seam for the external identity provider.
pub mod auth;
/// Configuration management loaded from environment variables.
pub mod config;
/// In-memory conversation state machine and score accumulation.
pub mod engine;
/// Error types and result aliases for the application.
pub mod error;
/// Scenario graphs: authored dialogue content, validated at load time.
pub mod scenario;
/// HTTP server implementation and request handling.
pub mod server;
/// SQLite storage layer for persistence.
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use server::{AppState, SharedState};
