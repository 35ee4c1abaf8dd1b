use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Engine(#[from] EngineError),

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Conversation-engine errors, shared by the in-memory session and the
/// server-authoritative adapter.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Authored content is inconsistent (dangling reference, wrong node
    /// type, malformed variant table). Fatal for the scenario; never retried.
    #[error("Scenario integrity error: {message}")]
    Integrity { message: String },

    /// A variant key resolved against an option that does not carry it.
    /// Load-time validation should make this unreachable for in-memory
    /// graphs, but relational variant rows are populated independently and
    /// can drift, so it is checked at every call site.
    #[error("Text variant {variant_key} not found for option {option_key}")]
    VariantNotFound {
        variant_key: String,
        option_key: String,
    },

    /// The chosen option does not belong to the current choice node.
    #[error("Option {option_key} does not belong to node {node_key}")]
    InvalidSelection {
        option_key: String,
        node_key: String,
    },

    /// A selection arrived after the conversation reached its terminal node.
    #[error("Conversation is already completed")]
    AlreadyCompleted,
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("Scenario not found: {slug}")]
    ScenarioNotFound { slug: String },

    #[error("Conversation not found: {conversation_id}")]
    ConversationNotFound { conversation_id: String },

    #[error("Node not found: {node_key}")]
    NodeNotFound { node_key: String },

    /// A concurrent or duplicate write lost the race for a conversation.
    /// The caller should re-fetch state and retry rather than reapply its
    /// payload.
    #[error("Conflicting write for conversation {conversation_id}: {message}")]
    Conflict {
        conversation_id: String,
        message: String,
    },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
