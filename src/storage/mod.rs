//! Storage layer for durable conversation state.
//!
//! This module provides SQLite-based storage for authored scenario content,
//! live conversations, the immutable step history, and the per-user score
//! aggregates.

mod sqlite;

pub use sqlite::SqliteStorage;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::{OutcomeLevel, ScoreTotals};
use crate::error::StorageResult;
use crate::scenario::{ScoreDelta, Tone, TraitLevel, VariantKey};

/// Node kind as stored in the relational graph.
///
/// Terminal response nodes are stored as `end`; the in-memory graph's
/// completion sentinel maps to an `end` row with no follow-up key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoredNodeType {
    /// A choice node offering options.
    Choice,
    /// A persona response leading to another choice node.
    Response,
    /// A terminal persona response.
    End,
}

impl fmt::Display for StoredNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoredNodeType::Choice => write!(f, "choice"),
            StoredNodeType::Response => write!(f, "response"),
            StoredNodeType::End => write!(f, "end"),
        }
    }
}

impl FromStr for StoredNodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "choice" => Ok(StoredNodeType::Choice),
            "response" => Ok(StoredNodeType::Response),
            "end" => Ok(StoredNodeType::End),
            _ => Err(format!("Unknown node type: {}", s)),
        }
    }
}

/// A scenario row.
#[derive(Debug, Clone)]
pub struct ScenarioRow {
    /// Row id.
    pub id: String,
    /// Stable scenario identifier.
    pub slug: String,
    /// Display title.
    pub title: String,
    /// Icon name used by the client.
    pub icon: Option<String>,
    /// Position in the scenario listing.
    pub order_index: i64,
    /// Whether the scenario is offered to users.
    pub is_active: bool,
    /// The OCEAN trait the primary variant level maps to.
    pub primary_trait: Option<String>,
    /// The OCEAN trait the secondary variant level maps to.
    pub secondary_trait: Option<String>,
    /// Persona briefing as JSON.
    pub persona: Option<serde_json::Value>,
    /// System framing for the scenario.
    pub system_message: Option<String>,
    /// The persona's first line.
    pub opening_message: Option<String>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the row was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A dialogue node row.
#[derive(Debug, Clone)]
pub struct NodeRow {
    /// Row id.
    pub id: String,
    /// Owning scenario row id.
    pub scenario_id: String,
    /// Node key, unique within the scenario.
    pub node_key: String,
    /// Node kind.
    pub node_type: StoredNodeType,
    /// Depth in the authored tree (informational).
    pub level: Option<i64>,
    /// The persona's line, on response/end rows.
    pub response_content: Option<String>,
    /// Follow-up node key, absent on end rows.
    pub next_node_key: Option<String>,
}

/// A dialogue option row.
#[derive(Debug, Clone)]
pub struct OptionRow {
    /// Row id.
    pub id: String,
    /// Owning node row id.
    pub node_id: String,
    /// Author-assigned option key.
    pub option_key: String,
    /// Display order within the node.
    pub order_index: i64,
    /// Score deltas applied when chosen.
    pub scores: ScoreDelta,
    /// Key of the response node this option leads to.
    pub next_node_key: String,
}

/// A live conversation row: the durable mirror of a session.
#[derive(Debug, Clone)]
pub struct ConversationRow {
    /// Row id, the opaque conversation identifier.
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Scenario row id.
    pub scenario_id: String,
    /// The choice node awaiting a selection (or the terminal node key once
    /// completed).
    pub current_node_key: String,
    /// Whether the attempt reached a terminal node.
    pub is_completed: bool,
    /// Locked reply tone for the attempt.
    pub tone: Tone,
    /// Locked primary trait level.
    pub primary_level: TraitLevel,
    /// Locked secondary trait level.
    pub secondary_level: TraitLevel,
    /// Running score totals.
    pub scores: ScoreTotals,
    /// Outcome tier, set exactly once at completion.
    pub outcome_level: Option<OutcomeLevel>,
    /// When this conversation was folded into the user aggregate.
    pub aggregated_at: Option<DateTime<Utc>>,
    /// When the attempt started.
    pub started_at: DateTime<Utc>,
    /// When the attempt completed.
    pub completed_at: Option<DateTime<Utc>>,
    /// When the row was last updated.
    pub updated_at: DateTime<Utc>,
}

impl ConversationRow {
    /// Create a new conversation positioned at the start node.
    pub fn new(
        user_id: impl Into<String>,
        scenario_id: impl Into<String>,
        tone: Tone,
        primary_level: TraitLevel,
        secondary_level: TraitLevel,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            scenario_id: scenario_id.into(),
            current_node_key: crate::scenario::START_NODE_KEY.to_string(),
            is_completed: false,
            tone,
            primary_level,
            secondary_level,
            scores: ScoreTotals::default(),
            outcome_level: None,
            aggregated_at: None,
            started_at: now,
            completed_at: None,
            updated_at: now,
        }
    }

    /// The variant key selected by this conversation's locked settings.
    pub fn variant_key(&self) -> VariantKey {
        VariantKey::new(self.tone, self.primary_level, self.secondary_level)
    }
}

/// One immutable history step: either a trainee choice or a persona
/// response, monotonically numbered from 1 within the conversation.
#[derive(Debug, Clone)]
pub struct HistoryStepRow {
    /// Row id.
    pub id: String,
    /// Owning conversation id.
    pub conversation_id: String,
    /// Position in the attempt, starting at 1.
    pub step_number: i64,
    /// Node the step happened at.
    pub node_key: String,
    /// Node kind at that step.
    pub node_type: StoredNodeType,
    /// Chosen option key, on choice steps.
    pub selected_option_key: Option<String>,
    /// Variant key the phrasing was resolved under, on choice steps.
    pub selected_variant_key: Option<String>,
    /// The resolved trainee line, on choice steps.
    pub selected_text: Option<String>,
    /// The persona's line, on response steps.
    pub ai_response: Option<String>,
    /// The chosen option's raw deltas (zero on response steps).
    pub step_scores: ScoreDelta,
    /// Totals after this step.
    pub cumulative: ScoreTotals,
    /// When the step was recorded.
    pub created_at: DateTime<Utc>,
}

impl HistoryStepRow {
    /// Record a trainee choice step.
    pub fn choice_step(
        conversation_id: impl Into<String>,
        step_number: i64,
        node_key: impl Into<String>,
        option_key: impl Into<String>,
        variant_key: VariantKey,
        selected_text: impl Into<String>,
        step_scores: ScoreDelta,
        cumulative: ScoreTotals,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            step_number,
            node_key: node_key.into(),
            node_type: StoredNodeType::Choice,
            selected_option_key: Some(option_key.into()),
            selected_variant_key: Some(variant_key.to_string()),
            selected_text: Some(selected_text.into()),
            ai_response: None,
            step_scores,
            cumulative,
            created_at: Utc::now(),
        }
    }

    /// Record a persona response step.
    pub fn response_step(
        conversation_id: impl Into<String>,
        step_number: i64,
        node_key: impl Into<String>,
        node_type: StoredNodeType,
        ai_response: impl Into<String>,
        cumulative: ScoreTotals,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            step_number,
            node_key: node_key.into(),
            node_type,
            selected_option_key: None,
            selected_variant_key: None,
            selected_text: None,
            ai_response: Some(ai_response.into()),
            step_scores: ScoreDelta::default(),
            cumulative,
            created_at: Utc::now(),
        }
    }
}

/// The pointer advance committed atomically with a step's history rows.
#[derive(Debug, Clone)]
pub struct StepCommit {
    /// The node key the conversation moves to (the terminal node's own key
    /// when completing).
    pub next_node_key: String,
    /// Totals after the step.
    pub totals: ScoreTotals,
    /// Present when the step completes the attempt.
    pub completion: Option<CompletionMark>,
}

/// Completion details written with the final step.
#[derive(Debug, Clone, Copy)]
pub struct CompletionMark {
    /// The classified outcome tier.
    pub outcome: OutcomeLevel,
    /// Completion timestamp.
    pub completed_at: DateTime<Utc>,
}

/// A per-user per-scenario aggregate row.
#[derive(Debug, Clone)]
pub struct UserScoreRow {
    /// Row id.
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Scenario row id.
    pub scenario_id: String,
    /// Best clarity score across completed attempts.
    pub best_clarity_score: i32,
    /// Best friendliness score across completed attempts.
    pub best_friendly_score: i32,
    /// Best empathy score across completed attempts.
    pub best_empathy_score: i32,
    /// Best total score across completed attempts.
    pub best_total_score: i32,
    /// Best outcome tier seen.
    pub best_outcome_level: Option<OutcomeLevel>,
    /// Mean clarity score over completed attempts.
    pub avg_clarity_score: f64,
    /// Mean friendliness score over completed attempts.
    pub avg_friendly_score: f64,
    /// Mean empathy score over completed attempts.
    pub avg_empathy_score: f64,
    /// Mean total score over completed attempts.
    pub avg_total_score: f64,
    /// Attempts counted into the aggregate.
    pub attempts_count: i64,
    /// Completed attempts counted into the aggregate.
    pub completed_count: i64,
    /// Timestamp of the most recent counted attempt.
    pub last_attempt_at: Option<DateTime<Utc>>,
}

/// Storage trait for database operations.
///
/// Defines every persistence operation the conversation service needs. The
/// two `commit_*` operations are transactional: each either applies fully
/// or leaves the database untouched.
#[async_trait]
pub trait Storage: Send + Sync {
    // Authored content

    /// Replace a scenario's authored content with a validated graph.
    async fn seed_scenario(&self, graph: &crate::scenario::ScenarioGraph) -> StorageResult<()>;
    /// Get a scenario by slug.
    async fn get_scenario_by_slug(&self, slug: &str) -> StorageResult<Option<ScenarioRow>>;
    /// List active scenarios ordered by `order_index`.
    async fn list_active_scenarios(&self) -> StorageResult<Vec<ScenarioRow>>;
    /// Get a node of a scenario by key.
    async fn get_node(&self, scenario_id: &str, node_key: &str) -> StorageResult<Option<NodeRow>>;
    /// Get a node's options ordered by `order_index`.
    async fn get_node_options(&self, node_id: &str) -> StorageResult<Vec<OptionRow>>;
    /// Find one of a node's options by author key or row id.
    async fn find_node_option(
        &self,
        node_id: &str,
        option_id: &str,
    ) -> StorageResult<Option<OptionRow>>;
    /// Get the phrasing of an option under a variant key.
    async fn get_variant_text(
        &self,
        option_id: &str,
        variant_key: &str,
    ) -> StorageResult<Option<String>>;

    // Conversations

    /// Create a conversation row.
    async fn create_conversation(&self, row: &ConversationRow) -> StorageResult<()>;
    /// Get a user's conversation by id.
    async fn get_conversation(
        &self,
        id: &str,
        user_id: &str,
    ) -> StorageResult<Option<ConversationRow>>;
    /// Highest recorded step number of a conversation (0 when none).
    async fn max_step_number(&self, conversation_id: &str) -> StorageResult<i64>;
    /// Full step history of a conversation, ordered by step number.
    async fn get_history(&self, conversation_id: &str) -> StorageResult<Vec<HistoryStepRow>>;
    /// Atomically record one step: both history rows plus the guarded
    /// pointer advance. A duplicate or racing step fails with
    /// [`crate::error::StorageError::Conflict`] and changes nothing.
    async fn commit_step(
        &self,
        expected_node_key: &str,
        user_step: &HistoryStepRow,
        ai_step: &HistoryStepRow,
        commit: &StepCommit,
    ) -> StorageResult<()>;

    // Aggregates

    /// Get a user's aggregate for one scenario.
    async fn get_user_score(
        &self,
        user_id: &str,
        scenario_id: &str,
    ) -> StorageResult<Option<UserScoreRow>>;
    /// All of a user's aggregates.
    async fn list_user_scores(&self, user_id: &str) -> StorageResult<Vec<UserScoreRow>>;
    /// Fold a completed conversation into the user aggregate, at most once
    /// per conversation. Returns `false` when the conversation was already
    /// counted (the call is a no-op).
    async fn apply_completion_to_aggregate(
        &self,
        conversation: &ConversationRow,
    ) -> StorageResult<bool>;
}
