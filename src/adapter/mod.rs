//! Server-authoritative conversation service.
//!
//! [`ConversationService`] mirrors the in-memory session contract against
//! relational rows: every client intent becomes a durable state transition,
//! each step writes immutable history rows before the guarded pointer
//! advance, and the per-user score aggregate is folded in at most once per
//! completed conversation. Step results reuse the engine's
//! [`StepOutcome`] shape so both backing stores answer identically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::AuthUser;
use crate::engine::{NextOption, OutcomeLevel, StepOutcome};
use crate::error::{AppError, AppResult, EngineError, StorageError};
use crate::scenario::{Tone, TraitLevel, VariantKey, START_NODE_KEY};
use crate::storage::{
    CompletionMark, ConversationRow, HistoryStepRow, ScenarioRow, SqliteStorage, StepCommit,
    Storage, StoredNodeType, UserScoreRow,
};

/// Request body for starting a conversation explicitly.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartConversationRequest {
    /// Scenario to open.
    pub scenario_slug: Option<String>,
    /// Reply tone, `friendly` or `professional`.
    pub tone: Option<String>,
    /// Primary trait level, `low` or `high`.
    pub primary_level: Option<String>,
    /// Secondary trait level, `low` or `high`.
    pub secondary_level: Option<String>,
}

/// Response for a started conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartConversationResponse {
    /// The opaque conversation identifier.
    pub conversation_id: String,
    /// Options of the start node, phrased under the chosen settings.
    pub initial_options: Vec<NextOption>,
}

/// Request body for selecting an option.
///
/// The four settings fields are required together exactly when
/// `conversation_id` is omitted, in which case the first selection also
/// creates the durable session.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SelectOptionRequest {
    /// Existing conversation to advance.
    pub conversation_id: Option<String>,
    /// The chosen option, by author key or row id.
    pub option_id: Option<String>,
    /// Scenario to open when auto-creating.
    pub scenario_slug: Option<String>,
    /// Reply tone when auto-creating.
    pub tone: Option<String>,
    /// Primary trait level when auto-creating.
    pub primary_level: Option<String>,
    /// Secondary trait level when auto-creating.
    pub secondary_level: Option<String>,
}

/// Response for one applied step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectOptionResponse {
    /// The conversation identifier (freshly created on first selection).
    pub conversation_id: String,
    /// The step's display state, identical in shape to the in-memory
    /// session's result.
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// Best scores section of a score report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BestScores {
    /// Best clarity score.
    pub clarity: i32,
    /// Best friendliness score.
    pub friendly: i32,
    /// Best empathy score.
    pub empathy: i32,
    /// Best total score.
    pub total: i32,
    /// Best outcome tier (absent for cross-scenario summaries).
    pub outcome_level: Option<OutcomeLevel>,
}

/// Average scores section of a score report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AverageScores {
    /// Mean clarity score.
    pub clarity: f64,
    /// Mean friendliness score.
    pub friendly: f64,
    /// Mean empathy score.
    pub empathy: f64,
    /// Mean total score.
    pub total: f64,
}

/// Attempt statistics section of a score report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreStatistics {
    /// Attempts counted into the aggregate.
    pub attempts: i64,
    /// Completed attempts counted into the aggregate.
    pub completed: i64,
    /// Timestamp of the most recent counted attempt.
    pub last_attempt: Option<DateTime<Utc>>,
}

/// Score report for one scenario, or summed across all of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetScoresResponse {
    /// Best scores across completed attempts.
    pub best_scores: BestScores,
    /// Mean scores over completed attempts.
    pub average_scores: AverageScores,
    /// Attempt statistics.
    pub statistics: ScoreStatistics,
}

/// Response of the aggregate-update operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateScoresResponse {
    /// Always true on success; a repeat call is a no-op but still succeeds.
    pub success: bool,
}

/// One scenario in the listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSummary {
    /// Stable scenario identifier.
    pub slug: String,
    /// Display title.
    pub title: String,
    /// Icon name used by the client.
    pub icon: Option<String>,
    /// Position in the listing.
    pub order_index: i64,
    /// Persona briefing as JSON.
    pub persona: Option<serde_json::Value>,
    /// The persona's first line.
    pub opening_message: Option<String>,
}

/// Response of the scenario listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioListResponse {
    /// Active scenarios ordered by `order_index`.
    pub scenarios: Vec<ScenarioSummary>,
}

/// Server-authoritative mirror of the conversation session.
#[derive(Clone)]
pub struct ConversationService {
    storage: SqliteStorage,
}

impl ConversationService {
    /// Create a service over a storage backend.
    pub fn new(storage: SqliteStorage) -> Self {
        Self { storage }
    }

    /// List the active scenarios.
    pub async fn list_scenarios(&self) -> AppResult<ScenarioListResponse> {
        let rows = self.storage.list_active_scenarios().await?;
        let scenarios = rows
            .into_iter()
            .map(|row| ScenarioSummary {
                slug: row.slug,
                title: row.title,
                icon: row.icon,
                order_index: row.order_index,
                persona: row.persona,
                opening_message: row.opening_message,
            })
            .collect();
        Ok(ScenarioListResponse { scenarios })
    }

    /// Create a durable conversation at the start node and return the
    /// initial options under the chosen settings.
    pub async fn start_conversation(
        &self,
        user: &AuthUser,
        req: StartConversationRequest,
    ) -> AppResult<StartConversationResponse> {
        let (slug, tone, primary_level, secondary_level) = required_settings(
            req.scenario_slug,
            req.tone,
            req.primary_level,
            req.secondary_level,
            "Missing required fields: scenario_slug, tone, primary_level, secondary_level",
        )?;

        let scenario = self.active_scenario(&slug).await?;
        if scenario.primary_trait.is_none() || scenario.secondary_trait.is_none() {
            return Err(EngineError::Integrity {
                message: format!("scenario {} traits not configured", slug),
            }
            .into());
        }

        let start = self
            .storage
            .get_node(&scenario.id, START_NODE_KEY)
            .await?
            .ok_or_else(|| StorageError::NodeNotFound {
                node_key: START_NODE_KEY.to_string(),
            })?;

        let row = ConversationRow::new(
            &user.user_id,
            &scenario.id,
            tone,
            primary_level,
            secondary_level,
        );
        self.storage.create_conversation(&row).await?;

        let initial_options = self.options_for_node(&start.id, row.variant_key()).await?;

        info!(
            conversation_id = %row.id,
            scenario = %slug,
            user_id = %user.user_id,
            "Conversation started"
        );

        Ok(StartConversationResponse {
            conversation_id: row.id,
            initial_options,
        })
    }

    /// Apply one selection to a durable conversation, creating the
    /// conversation first when no id was supplied.
    pub async fn select_option(
        &self,
        user: &AuthUser,
        req: SelectOptionRequest,
    ) -> AppResult<SelectOptionResponse> {
        let SelectOptionRequest {
            conversation_id,
            option_id,
            scenario_slug,
            tone,
            primary_level,
            secondary_level,
        } = req;

        let option_id = option_id.ok_or_else(|| AppError::InvalidRequest {
            message: "Missing required field: option_id".to_string(),
        })?;

        let conversation = match conversation_id {
            Some(id) => self
                .storage
                .get_conversation(&id, &user.user_id)
                .await?
                .ok_or_else(|| StorageError::ConversationNotFound {
                    conversation_id: id.clone(),
                })?,
            None => {
                let (slug, tone, primary_level, secondary_level) = required_settings(
                    scenario_slug,
                    tone,
                    primary_level,
                    secondary_level,
                    "Either conversation_id OR (scenario_slug, tone, primary_level, \
                     secondary_level) must be provided",
                )?;
                let scenario = self.active_scenario(&slug).await?;
                let row = ConversationRow::new(
                    &user.user_id,
                    &scenario.id,
                    tone,
                    primary_level,
                    secondary_level,
                );
                self.storage.create_conversation(&row).await?;
                row
            }
        };

        if conversation.is_completed {
            return Err(EngineError::AlreadyCompleted.into());
        }

        let node = self
            .storage
            .get_node(&conversation.scenario_id, &conversation.current_node_key)
            .await?
            .ok_or_else(|| StorageError::NodeNotFound {
                node_key: conversation.current_node_key.clone(),
            })?;
        if node.node_type != StoredNodeType::Choice {
            return Err(EngineError::Integrity {
                message: format!("node {} is not a choice node", node.node_key),
            }
            .into());
        }

        let option = self
            .storage
            .find_node_option(&node.id, &option_id)
            .await?
            .ok_or_else(|| EngineError::InvalidSelection {
                option_key: option_id.clone(),
                node_key: node.node_key.clone(),
            })?;

        let variant_key = conversation.variant_key();
        let selected_text = self
            .storage
            .get_variant_text(&option.id, &variant_key.to_string())
            .await?
            .ok_or_else(|| EngineError::VariantNotFound {
                variant_key: variant_key.to_string(),
                option_key: option.option_key.clone(),
            })?;

        let totals = conversation.scores.plus(&option.scores);

        let response_node = self
            .storage
            .get_node(&conversation.scenario_id, &option.next_node_key)
            .await?
            .ok_or_else(|| StorageError::NodeNotFound {
                node_key: option.next_node_key.clone(),
            })?;
        if response_node.node_type == StoredNodeType::Choice {
            return Err(EngineError::Integrity {
                message: format!(
                    "option {} leads to choice node {}, expected a response node",
                    option.option_key, response_node.node_key
                ),
            }
            .into());
        }
        let ai_response = response_node.response_content.clone().unwrap_or_default();

        let is_completed = response_node.node_type == StoredNodeType::End;
        let (next_options, commit) = if is_completed {
            (
                None,
                StepCommit {
                    next_node_key: response_node.node_key.clone(),
                    totals,
                    completion: Some(CompletionMark {
                        outcome: OutcomeLevel::classify(totals.total),
                        completed_at: Utc::now(),
                    }),
                },
            )
        } else {
            let follow_key =
                response_node
                    .next_node_key
                    .clone()
                    .ok_or_else(|| EngineError::Integrity {
                        message: format!(
                            "response node {} has no follow-up node",
                            response_node.node_key
                        ),
                    })?;
            let follow = self
                .storage
                .get_node(&conversation.scenario_id, &follow_key)
                .await?
                .ok_or_else(|| StorageError::NodeNotFound {
                    node_key: follow_key.clone(),
                })?;
            if follow.node_type != StoredNodeType::Choice {
                return Err(EngineError::Integrity {
                    message: format!("node {} is not a choice node", follow.node_key),
                }
                .into());
            }
            let options = self.options_for_node(&follow.id, variant_key).await?;
            (
                Some(options),
                StepCommit {
                    next_node_key: follow_key,
                    totals,
                    completion: None,
                },
            )
        };

        let last_step = self.storage.max_step_number(&conversation.id).await?;
        let user_step = HistoryStepRow::choice_step(
            &conversation.id,
            last_step + 1,
            &node.node_key,
            &option.option_key,
            variant_key,
            &selected_text,
            option.scores,
            totals,
        );
        let ai_step = HistoryStepRow::response_step(
            &conversation.id,
            last_step + 2,
            &response_node.node_key,
            response_node.node_type,
            &ai_response,
            totals,
        );

        self.storage
            .commit_step(&conversation.current_node_key, &user_step, &ai_step, &commit)
            .await?;

        info!(
            conversation_id = %conversation.id,
            option = %option.option_key,
            step = last_step + 1,
            is_completed,
            "Selection applied"
        );

        Ok(SelectOptionResponse {
            conversation_id: conversation.id,
            outcome: StepOutcome {
                ai_response,
                next_options,
                step_scores: option.scores,
                cumulative_scores: totals,
                is_completed,
                outcome_level: commit.completion.map(|c| c.outcome),
            },
        })
    }

    /// Score report for one scenario, or summed across all scenarios when
    /// the slug is omitted.
    pub async fn get_scores(
        &self,
        user: &AuthUser,
        scenario_slug: Option<&str>,
    ) -> AppResult<GetScoresResponse> {
        match scenario_slug {
            Some(slug) => {
                let scenario = self.active_scenario(slug).await?;
                let row = self
                    .storage
                    .get_user_score(&user.user_id, &scenario.id)
                    .await?;
                Ok(row.map(scenario_report).unwrap_or_default())
            }
            None => {
                let rows = self.storage.list_user_scores(&user.user_id).await?;
                Ok(summary_report(&rows))
            }
        }
    }

    /// Fold a completed conversation into the per-user aggregate. Safe to
    /// retry: a conversation is counted at most once.
    pub async fn update_scores(
        &self,
        user: &AuthUser,
        conversation_id: Option<String>,
    ) -> AppResult<UpdateScoresResponse> {
        let conversation_id = conversation_id.ok_or_else(|| AppError::InvalidRequest {
            message: "Missing required field: conversation_id".to_string(),
        })?;
        let conversation = self
            .storage
            .get_conversation(&conversation_id, &user.user_id)
            .await?
            .ok_or_else(|| StorageError::ConversationNotFound {
                conversation_id: conversation_id.clone(),
            })?;

        if !conversation.is_completed {
            return Err(AppError::InvalidRequest {
                message: "Conversation is not completed yet".to_string(),
            });
        }

        let counted = self
            .storage
            .apply_completion_to_aggregate(&conversation)
            .await?;
        debug!(
            conversation_id = %conversation.id,
            counted,
            "Aggregate update applied"
        );

        Ok(UpdateScoresResponse { success: true })
    }

    async fn active_scenario(&self, slug: &str) -> AppResult<ScenarioRow> {
        match self.storage.get_scenario_by_slug(slug).await? {
            Some(scenario) if scenario.is_active => Ok(scenario),
            _ => Err(StorageError::ScenarioNotFound {
                slug: slug.to_string(),
            }
            .into()),
        }
    }

    async fn options_for_node(
        &self,
        node_id: &str,
        variant_key: VariantKey,
    ) -> AppResult<Vec<NextOption>> {
        let options = self.storage.get_node_options(node_id).await?;
        let key = variant_key.to_string();

        let mut resolved = Vec::with_capacity(options.len());
        for option in options {
            match self.storage.get_variant_text(&option.id, &key).await? {
                Some(text) => resolved.push(NextOption {
                    id: option.option_key,
                    text,
                    order_index: option.order_index,
                }),
                None => warn!(
                    option_key = %option.option_key,
                    variant_key = %key,
                    "Skipping option without text variant"
                ),
            }
        }
        Ok(resolved)
    }
}

fn required_settings(
    slug: Option<String>,
    tone: Option<String>,
    primary_level: Option<String>,
    secondary_level: Option<String>,
    missing_message: &str,
) -> AppResult<(String, Tone, TraitLevel, TraitLevel)> {
    let (Some(slug), Some(tone), Some(primary), Some(secondary)) =
        (slug, tone, primary_level, secondary_level)
    else {
        return Err(AppError::InvalidRequest {
            message: missing_message.to_string(),
        });
    };

    let tone: Tone = tone.parse().map_err(|_| AppError::InvalidRequest {
        message: "Invalid tone. Must be 'friendly' or 'professional'".to_string(),
    })?;
    let primary: TraitLevel = primary.parse().map_err(|_| AppError::InvalidRequest {
        message: "Invalid primary_level. Must be 'low' or 'high'".to_string(),
    })?;
    let secondary: TraitLevel = secondary.parse().map_err(|_| AppError::InvalidRequest {
        message: "Invalid secondary_level. Must be 'low' or 'high'".to_string(),
    })?;

    Ok((slug, tone, primary, secondary))
}

fn scenario_report(row: UserScoreRow) -> GetScoresResponse {
    GetScoresResponse {
        best_scores: BestScores {
            clarity: row.best_clarity_score,
            friendly: row.best_friendly_score,
            empathy: row.best_empathy_score,
            total: row.best_total_score,
            outcome_level: row.best_outcome_level,
        },
        average_scores: AverageScores {
            clarity: row.avg_clarity_score,
            friendly: row.avg_friendly_score,
            empathy: row.avg_empathy_score,
            total: row.avg_total_score,
        },
        statistics: ScoreStatistics {
            attempts: row.attempts_count,
            completed: row.completed_count,
            last_attempt: row.last_attempt_at,
        },
    }
}

fn summary_report(rows: &[UserScoreRow]) -> GetScoresResponse {
    if rows.is_empty() {
        return GetScoresResponse::default();
    }

    let count = rows.len() as f64;
    let mut report = GetScoresResponse::default();
    for row in rows {
        report.best_scores.clarity += row.best_clarity_score;
        report.best_scores.friendly += row.best_friendly_score;
        report.best_scores.empathy += row.best_empathy_score;
        report.best_scores.total += row.best_total_score;
        report.average_scores.clarity += row.avg_clarity_score;
        report.average_scores.friendly += row.avg_friendly_score;
        report.average_scores.empathy += row.avg_empathy_score;
        report.average_scores.total += row.avg_total_score;
        report.statistics.attempts += row.attempts_count;
        report.statistics.completed += row.completed_count;
        report.statistics.last_attempt =
            report.statistics.last_attempt.max(row.last_attempt_at);
    }
    report.average_scores.clarity /= count;
    report.average_scores.friendly /= count;
    report.average_scores.empathy /= count;
    report.average_scores.total /= count;
    // Bests are per-scenario maxima; the summary sums them and carries no
    // meaningful tier.
    report.best_scores.outcome_level = None;
    report
}
