use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;
use uuid::Uuid;

use super::{
    CompletionMark, ConversationRow, HistoryStepRow, NodeRow, OptionRow, ScenarioRow, StepCommit,
    Storage, StoredNodeType, UserScoreRow,
};
use crate::config::DatabaseConfig;
use crate::engine::ScoreTotals;
use crate::error::{StorageError, StorageResult};
use crate::scenario::{Node, ScenarioGraph, ScoreDelta, VariantKey};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed storage implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Create an in-memory storage instance, used by tests.
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .foreign_keys(true);

        // A single long-lived connection: an in-memory database exists only
        // as long as its connection does.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Migration {
                message: format!("Failed to run migrations: {}", e),
            })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn seed_scenario(&self, graph: &ScenarioGraph) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        // Re-seeding replaces the scenario wholesale, including any live
        // conversations and aggregates recorded against the old content.
        let existing: Option<String> =
            sqlx::query_scalar("SELECT id FROM scenarios WHERE slug = ?")
                .bind(&graph.slug)
                .fetch_optional(&mut *tx)
                .await?;
        if let Some(scenario_id) = existing {
            sqlx::query("DELETE FROM user_conversations WHERE scenario_id = ?")
                .bind(&scenario_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM user_scores WHERE scenario_id = ?")
                .bind(&scenario_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM scenarios WHERE id = ?")
                .bind(&scenario_id)
                .execute(&mut *tx)
                .await?;
        }

        let scenario_id = Uuid::new_v4().to_string();
        let persona = serde_json::to_string(&graph.persona).unwrap_or_default();
        sqlx::query(
            r#"
            INSERT INTO scenarios
                (id, slug, title, icon, order_index, is_active, primary_trait, secondary_trait,
                 persona, system_message, opening_message, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 1, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&scenario_id)
        .bind(&graph.slug)
        .bind(&graph.title)
        .bind(&graph.icon)
        .bind(graph.order_index)
        .bind(graph.primary_trait.to_string())
        .bind(graph.secondary_trait.to_string())
        .bind(&persona)
        .bind(&graph.system_message)
        .bind(&graph.opening_message)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        for node in graph.nodes() {
            let node_id = Uuid::new_v4().to_string();
            match node {
                Node::Choice(choice) => {
                    sqlx::query(
                        r#"
                        INSERT INTO dialogue_nodes
                            (id, scenario_id, node_key, node_type, level, response_content,
                             next_node_key, created_at)
                        VALUES (?, ?, ?, 'choice', ?, NULL, NULL, ?)
                        "#,
                    )
                    .bind(&node_id)
                    .bind(&scenario_id)
                    .bind(&choice.key)
                    .bind(choice.level)
                    .bind(&now)
                    .execute(&mut *tx)
                    .await?;

                    for option in &choice.options {
                        let option_id = Uuid::new_v4().to_string();
                        sqlx::query(
                            r#"
                            INSERT INTO dialogue_options
                                (id, node_id, option_key, order_index, score_clarity,
                                 score_friendly, score_empathy, next_node_key, created_at)
                            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                            "#,
                        )
                        .bind(&option_id)
                        .bind(&node_id)
                        .bind(&option.key)
                        .bind(option.order_index)
                        .bind(option.scores.clarity)
                        .bind(option.scores.friendly)
                        .bind(option.scores.empathy)
                        .bind(option.next.to_string())
                        .bind(&now)
                        .execute(&mut *tx)
                        .await?;

                        for key in VariantKey::all() {
                            if let Some(text) = option.text.get(&key) {
                                sqlx::query(
                                    r#"
                                    INSERT INTO option_text_variants
                                        (id, option_id, variant_key, text_content, created_at)
                                    VALUES (?, ?, ?, ?, ?)
                                    "#,
                                )
                                .bind(Uuid::new_v4().to_string())
                                .bind(&option_id)
                                .bind(key.to_string())
                                .bind(text)
                                .bind(&now)
                                .execute(&mut *tx)
                                .await?;
                            }
                        }
                    }
                }
                Node::Response(response) => {
                    let node_type = if response.next.is_complete() {
                        StoredNodeType::End
                    } else {
                        StoredNodeType::Response
                    };
                    sqlx::query(
                        r#"
                        INSERT INTO dialogue_nodes
                            (id, scenario_id, node_key, node_type, level, response_content,
                             next_node_key, created_at)
                        VALUES (?, ?, ?, ?, NULL, ?, ?, ?)
                        "#,
                    )
                    .bind(&node_id)
                    .bind(&scenario_id)
                    .bind(&response.key)
                    .bind(node_type.to_string())
                    .bind(&response.content)
                    .bind(response.next.key())
                    .bind(&now)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;
        info!(slug = %graph.slug, nodes = graph.node_count(), "Scenario seeded");
        Ok(())
    }

    async fn get_scenario_by_slug(&self, slug: &str) -> StorageResult<Option<ScenarioRow>> {
        let row: Option<ScenarioSqlRow> = sqlx::query_as(
            r#"
            SELECT id, slug, title, icon, order_index, is_active, primary_trait, secondary_trait,
                   persona, system_message, opening_message, created_at, updated_at
            FROM scenarios
            WHERE slug = ?
            "#,
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn list_active_scenarios(&self) -> StorageResult<Vec<ScenarioRow>> {
        let rows: Vec<ScenarioSqlRow> = sqlx::query_as(
            r#"
            SELECT id, slug, title, icon, order_index, is_active, primary_trait, secondary_trait,
                   persona, system_message, opening_message, created_at, updated_at
            FROM scenarios
            WHERE is_active = 1
            ORDER BY order_index ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn get_node(&self, scenario_id: &str, node_key: &str) -> StorageResult<Option<NodeRow>> {
        let row: Option<NodeSqlRow> = sqlx::query_as(
            r#"
            SELECT id, scenario_id, node_key, node_type, level, response_content, next_node_key
            FROM dialogue_nodes
            WHERE scenario_id = ? AND node_key = ?
            "#,
        )
        .bind(scenario_id)
        .bind(node_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn get_node_options(&self, node_id: &str) -> StorageResult<Vec<OptionRow>> {
        let rows: Vec<OptionSqlRow> = sqlx::query_as(
            r#"
            SELECT id, node_id, option_key, order_index, score_clarity, score_friendly,
                   score_empathy, next_node_key
            FROM dialogue_options
            WHERE node_id = ?
            ORDER BY order_index ASC
            "#,
        )
        .bind(node_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn find_node_option(
        &self,
        node_id: &str,
        option_id: &str,
    ) -> StorageResult<Option<OptionRow>> {
        // Clients may address an option by author key or by row id.
        let row: Option<OptionSqlRow> = sqlx::query_as(
            r#"
            SELECT id, node_id, option_key, order_index, score_clarity, score_friendly,
                   score_empathy, next_node_key
            FROM dialogue_options
            WHERE node_id = ? AND (option_key = ? OR id = ?)
            "#,
        )
        .bind(node_id)
        .bind(option_id)
        .bind(option_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn get_variant_text(
        &self,
        option_id: &str,
        variant_key: &str,
    ) -> StorageResult<Option<String>> {
        let text: Option<String> = sqlx::query_scalar(
            r#"
            SELECT text_content
            FROM option_text_variants
            WHERE option_id = ? AND variant_key = ?
            "#,
        )
        .bind(option_id)
        .bind(variant_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(text)
    }

    async fn create_conversation(&self, row: &ConversationRow) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_conversations
                (id, user_id, scenario_id, current_node_key, is_completed, tone, primary_level,
                 secondary_level, score_clarity, score_friendly, score_empathy, total_score,
                 outcome_level, aggregated_at, started_at, completed_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.user_id)
        .bind(&row.scenario_id)
        .bind(&row.current_node_key)
        .bind(row.is_completed)
        .bind(row.tone.to_string())
        .bind(row.primary_level.to_string())
        .bind(row.secondary_level.to_string())
        .bind(row.scores.clarity)
        .bind(row.scores.friendly)
        .bind(row.scores.empathy)
        .bind(row.scores.total)
        .bind(row.outcome_level.map(|o| o.to_string()))
        .bind(row.aggregated_at.map(|t| t.to_rfc3339()))
        .bind(row.started_at.to_rfc3339())
        .bind(row.completed_at.map(|t| t.to_rfc3339()))
        .bind(row.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_conversation(
        &self,
        id: &str,
        user_id: &str,
    ) -> StorageResult<Option<ConversationRow>> {
        let row: Option<ConversationSqlRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, scenario_id, current_node_key, is_completed, tone, primary_level,
                   secondary_level, score_clarity, score_friendly, score_empathy, total_score,
                   outcome_level, aggregated_at, started_at, completed_at, updated_at
            FROM user_conversations
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn max_step_number(&self, conversation_id: &str) -> StorageResult<i64> {
        let max: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(MAX(step_number), 0)
            FROM conversation_history_steps
            WHERE conversation_id = ?
            "#,
        )
        .bind(conversation_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(max)
    }

    async fn get_history(&self, conversation_id: &str) -> StorageResult<Vec<HistoryStepRow>> {
        let rows: Vec<HistoryStepSqlRow> = sqlx::query_as(
            r#"
            SELECT id, conversation_id, step_number, node_key, node_type, selected_option_key,
                   selected_variant_key, selected_text, ai_response, step_score_clarity,
                   step_score_friendly, step_score_empathy, cumulative_score_clarity,
                   cumulative_score_friendly, cumulative_score_empathy, cumulative_total_score,
                   created_at
            FROM conversation_history_steps
            WHERE conversation_id = ?
            ORDER BY step_number ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn commit_step(
        &self,
        expected_node_key: &str,
        user_step: &HistoryStepRow,
        ai_step: &HistoryStepRow,
        commit: &StepCommit,
    ) -> StorageResult<()> {
        let conversation_id = user_step.conversation_id.clone();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| conflict_or_sqlx(&conversation_id, e))?;

        insert_history_step(&mut tx, user_step)
            .await
            .map_err(|e| conflict_or_sqlx(&conversation_id, e))?;
        insert_history_step(&mut tx, ai_step)
            .await
            .map_err(|e| conflict_or_sqlx(&conversation_id, e))?;

        let (is_completed, outcome_level, completed_at) = match &commit.completion {
            Some(CompletionMark {
                outcome,
                completed_at,
            }) => (true, Some(outcome.to_string()), Some(completed_at.to_rfc3339())),
            None => (false, None, None),
        };

        // The pointer advance is the single commit point of a step; the
        // guard loses cleanly when another request advanced the row first.
        let result = sqlx::query(
            r#"
            UPDATE user_conversations
            SET current_node_key = ?, score_clarity = ?, score_friendly = ?, score_empathy = ?,
                total_score = ?, is_completed = ?, outcome_level = ?, completed_at = ?,
                updated_at = ?
            WHERE id = ? AND current_node_key = ? AND is_completed = 0
            "#,
        )
        .bind(&commit.next_node_key)
        .bind(commit.totals.clarity)
        .bind(commit.totals.friendly)
        .bind(commit.totals.empathy)
        .bind(commit.totals.total)
        .bind(is_completed)
        .bind(outcome_level)
        .bind(completed_at)
        .bind(Utc::now().to_rfc3339())
        .bind(&conversation_id)
        .bind(expected_node_key)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_or_sqlx(&conversation_id, e))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict {
                conversation_id,
                message: "conversation advanced by another request".to_string(),
            });
        }

        tx.commit()
            .await
            .map_err(|e| conflict_or_sqlx(&conversation_id, e))?;
        Ok(())
    }

    async fn get_user_score(
        &self,
        user_id: &str,
        scenario_id: &str,
    ) -> StorageResult<Option<UserScoreRow>> {
        let row: Option<UserScoreSqlRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, scenario_id, best_clarity_score, best_friendly_score,
                   best_empathy_score, best_total_score, best_outcome_level, avg_clarity_score,
                   avg_friendly_score, avg_empathy_score, avg_total_score, attempts_count,
                   completed_count, last_attempt_at
            FROM user_scores
            WHERE user_id = ? AND scenario_id = ?
            "#,
        )
        .bind(user_id)
        .bind(scenario_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn list_user_scores(&self, user_id: &str) -> StorageResult<Vec<UserScoreRow>> {
        let rows: Vec<UserScoreSqlRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, scenario_id, best_clarity_score, best_friendly_score,
                   best_empathy_score, best_total_score, best_outcome_level, avg_clarity_score,
                   avg_friendly_score, avg_empathy_score, avg_total_score, attempts_count,
                   completed_count, last_attempt_at
            FROM user_scores
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn apply_completion_to_aggregate(
        &self,
        conversation: &ConversationRow,
    ) -> StorageResult<bool> {
        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| conflict_or_sqlx(&conversation.id, e))?;

        // The gate: only the first call for a conversation passes.
        let marked = sqlx::query(
            r#"
            UPDATE user_conversations
            SET aggregated_at = ?
            WHERE id = ? AND is_completed = 1 AND aggregated_at IS NULL
            "#,
        )
        .bind(now.to_rfc3339())
        .bind(&conversation.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_or_sqlx(&conversation.id, e))?;

        if marked.rows_affected() == 0 {
            return Ok(false);
        }

        let existing: Option<UserScoreSqlRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, scenario_id, best_clarity_score, best_friendly_score,
                   best_empathy_score, best_total_score, best_outcome_level, avg_clarity_score,
                   avg_friendly_score, avg_empathy_score, avg_total_score, attempts_count,
                   completed_count, last_attempt_at
            FROM user_scores
            WHERE user_id = ? AND scenario_id = ?
            "#,
        )
        .bind(&conversation.user_id)
        .bind(&conversation.scenario_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| conflict_or_sqlx(&conversation.id, e))?;

        let finals = conversation.scores;
        match existing {
            Some(row) => {
                let existing: UserScoreRow = row.into();
                let completed = existing.completed_count + 1;
                let mean = |avg: f64, value: i32| {
                    (avg * existing.completed_count as f64 + f64::from(value)) / completed as f64
                };
                let best_outcome = existing.best_outcome_level.max(conversation.outcome_level);

                sqlx::query(
                    r#"
                    UPDATE user_scores
                    SET best_clarity_score = ?, best_friendly_score = ?, best_empathy_score = ?,
                        best_total_score = ?, best_outcome_level = ?, avg_clarity_score = ?,
                        avg_friendly_score = ?, avg_empathy_score = ?, avg_total_score = ?,
                        attempts_count = ?, completed_count = ?, last_attempt_at = ?,
                        updated_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(existing.best_clarity_score.max(finals.clarity))
                .bind(existing.best_friendly_score.max(finals.friendly))
                .bind(existing.best_empathy_score.max(finals.empathy))
                .bind(existing.best_total_score.max(finals.total))
                .bind(best_outcome.map(|o| o.to_string()))
                .bind(mean(existing.avg_clarity_score, finals.clarity))
                .bind(mean(existing.avg_friendly_score, finals.friendly))
                .bind(mean(existing.avg_empathy_score, finals.empathy))
                .bind(mean(existing.avg_total_score, finals.total))
                .bind(existing.attempts_count + 1)
                .bind(completed)
                .bind(now.to_rfc3339())
                .bind(now.to_rfc3339())
                .bind(&existing.id)
                .execute(&mut *tx)
                .await
                .map_err(|e| conflict_or_sqlx(&conversation.id, e))?;
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO user_scores
                        (id, user_id, scenario_id, best_clarity_score, best_friendly_score,
                         best_empathy_score, best_total_score, best_outcome_level,
                         avg_clarity_score, avg_friendly_score, avg_empathy_score,
                         avg_total_score, attempts_count, completed_count, last_attempt_at,
                         created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, 1, ?, ?, ?)
                    "#,
                )
                .bind(Uuid::new_v4().to_string())
                .bind(&conversation.user_id)
                .bind(&conversation.scenario_id)
                .bind(finals.clarity)
                .bind(finals.friendly)
                .bind(finals.empathy)
                .bind(finals.total)
                .bind(conversation.outcome_level.map(|o| o.to_string()))
                .bind(f64::from(finals.clarity))
                .bind(f64::from(finals.friendly))
                .bind(f64::from(finals.empathy))
                .bind(f64::from(finals.total))
                .bind(now.to_rfc3339())
                .bind(now.to_rfc3339())
                .bind(now.to_rfc3339())
                .execute(&mut *tx)
                .await
                .map_err(|e| conflict_or_sqlx(&conversation.id, e))?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| conflict_or_sqlx(&conversation.id, e))?;
        Ok(true)
    }
}

async fn insert_history_step(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    step: &HistoryStepRow,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO conversation_history_steps
            (id, conversation_id, step_number, node_key, node_type, selected_option_key,
             selected_variant_key, selected_text, ai_response, step_score_clarity,
             step_score_friendly, step_score_empathy, cumulative_score_clarity,
             cumulative_score_friendly, cumulative_score_empathy, cumulative_total_score,
             created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&step.id)
    .bind(&step.conversation_id)
    .bind(step.step_number)
    .bind(&step.node_key)
    .bind(step.node_type.to_string())
    .bind(&step.selected_option_key)
    .bind(&step.selected_variant_key)
    .bind(&step.selected_text)
    .bind(&step.ai_response)
    .bind(step.step_scores.clarity)
    .bind(step.step_scores.friendly)
    .bind(step.step_scores.empathy)
    .bind(step.cumulative.clarity)
    .bind(step.cumulative.friendly)
    .bind(step.cumulative.empathy)
    .bind(step.cumulative.total)
    .bind(step.created_at.to_rfc3339())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Map write failures that mean "you lost a race" to a retryable Conflict.
fn conflict_or_sqlx(conversation_id: &str, e: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(ref db) = e {
        let message = db.message().to_string();
        if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation)
            || message.contains("locked")
            || message.contains("busy")
        {
            return StorageError::Conflict {
                conversation_id: conversation_id.to_string(),
                message,
            };
        }
    }
    StorageError::Sqlx(e)
}

// Internal row types for SQLx mapping

#[derive(sqlx::FromRow)]
struct ScenarioSqlRow {
    id: String,
    slug: String,
    title: String,
    icon: Option<String>,
    order_index: i64,
    is_active: bool,
    primary_trait: Option<String>,
    secondary_trait: Option<String>,
    persona: Option<String>,
    system_message: Option<String>,
    opening_message: Option<String>,
    created_at: String,
    updated_at: String,
}

impl From<ScenarioSqlRow> for ScenarioRow {
    fn from(row: ScenarioSqlRow) -> Self {
        Self {
            id: row.id,
            slug: row.slug,
            title: row.title,
            icon: row.icon,
            order_index: row.order_index,
            is_active: row.is_active,
            primary_trait: row.primary_trait,
            secondary_trait: row.secondary_trait,
            persona: row.persona.and_then(|s| serde_json::from_str(&s).ok()),
            system_message: row.system_message,
            opening_message: row.opening_message,
            created_at: parse_datetime(&row.created_at),
            updated_at: parse_datetime(&row.updated_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct NodeSqlRow {
    id: String,
    scenario_id: String,
    node_key: String,
    node_type: String,
    level: Option<i64>,
    response_content: Option<String>,
    next_node_key: Option<String>,
}

impl From<NodeSqlRow> for NodeRow {
    fn from(row: NodeSqlRow) -> Self {
        Self {
            id: row.id,
            scenario_id: row.scenario_id,
            node_key: row.node_key,
            node_type: row.node_type.parse().unwrap_or(StoredNodeType::Response),
            level: row.level,
            response_content: row.response_content,
            next_node_key: row.next_node_key,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OptionSqlRow {
    id: String,
    node_id: String,
    option_key: String,
    order_index: i64,
    score_clarity: i64,
    score_friendly: i64,
    score_empathy: i64,
    next_node_key: String,
}

impl From<OptionSqlRow> for OptionRow {
    fn from(row: OptionSqlRow) -> Self {
        Self {
            id: row.id,
            node_id: row.node_id,
            option_key: row.option_key,
            order_index: row.order_index,
            scores: ScoreDelta {
                clarity: row.score_clarity as i32,
                friendly: row.score_friendly as i32,
                empathy: row.score_empathy as i32,
            },
            next_node_key: row.next_node_key,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ConversationSqlRow {
    id: String,
    user_id: String,
    scenario_id: String,
    current_node_key: String,
    is_completed: bool,
    tone: String,
    primary_level: String,
    secondary_level: String,
    score_clarity: i64,
    score_friendly: i64,
    score_empathy: i64,
    total_score: i64,
    outcome_level: Option<String>,
    aggregated_at: Option<String>,
    started_at: String,
    completed_at: Option<String>,
    updated_at: String,
}

impl From<ConversationSqlRow> for ConversationRow {
    fn from(row: ConversationSqlRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            scenario_id: row.scenario_id,
            current_node_key: row.current_node_key,
            is_completed: row.is_completed,
            tone: row.tone.parse().unwrap_or(crate::scenario::Tone::Friendly),
            primary_level: row
                .primary_level
                .parse()
                .unwrap_or(crate::scenario::TraitLevel::Low),
            secondary_level: row
                .secondary_level
                .parse()
                .unwrap_or(crate::scenario::TraitLevel::Low),
            scores: ScoreTotals {
                clarity: row.score_clarity as i32,
                friendly: row.score_friendly as i32,
                empathy: row.score_empathy as i32,
                total: row.total_score as i32,
            },
            outcome_level: row.outcome_level.and_then(|s| s.parse().ok()),
            aggregated_at: row.aggregated_at.as_deref().map(parse_datetime),
            started_at: parse_datetime(&row.started_at),
            completed_at: row.completed_at.as_deref().map(parse_datetime),
            updated_at: parse_datetime(&row.updated_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct HistoryStepSqlRow {
    id: String,
    conversation_id: String,
    step_number: i64,
    node_key: String,
    node_type: String,
    selected_option_key: Option<String>,
    selected_variant_key: Option<String>,
    selected_text: Option<String>,
    ai_response: Option<String>,
    step_score_clarity: i64,
    step_score_friendly: i64,
    step_score_empathy: i64,
    cumulative_score_clarity: i64,
    cumulative_score_friendly: i64,
    cumulative_score_empathy: i64,
    cumulative_total_score: i64,
    created_at: String,
}

impl From<HistoryStepSqlRow> for HistoryStepRow {
    fn from(row: HistoryStepSqlRow) -> Self {
        Self {
            id: row.id,
            conversation_id: row.conversation_id,
            step_number: row.step_number,
            node_key: row.node_key,
            node_type: row.node_type.parse().unwrap_or(StoredNodeType::Response),
            selected_option_key: row.selected_option_key,
            selected_variant_key: row.selected_variant_key,
            selected_text: row.selected_text,
            ai_response: row.ai_response,
            step_scores: ScoreDelta {
                clarity: row.step_score_clarity as i32,
                friendly: row.step_score_friendly as i32,
                empathy: row.step_score_empathy as i32,
            },
            cumulative: ScoreTotals {
                clarity: row.cumulative_score_clarity as i32,
                friendly: row.cumulative_score_friendly as i32,
                empathy: row.cumulative_score_empathy as i32,
                total: row.cumulative_total_score as i32,
            },
            created_at: parse_datetime(&row.created_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct UserScoreSqlRow {
    id: String,
    user_id: String,
    scenario_id: String,
    best_clarity_score: i64,
    best_friendly_score: i64,
    best_empathy_score: i64,
    best_total_score: i64,
    best_outcome_level: Option<String>,
    avg_clarity_score: f64,
    avg_friendly_score: f64,
    avg_empathy_score: f64,
    avg_total_score: f64,
    attempts_count: i64,
    completed_count: i64,
    last_attempt_at: Option<String>,
}

impl From<UserScoreSqlRow> for UserScoreRow {
    fn from(row: UserScoreSqlRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            scenario_id: row.scenario_id,
            best_clarity_score: row.best_clarity_score as i32,
            best_friendly_score: row.best_friendly_score as i32,
            best_empathy_score: row.best_empathy_score as i32,
            best_total_score: row.best_total_score as i32,
            best_outcome_level: row.best_outcome_level.and_then(|s| s.parse().ok()),
            avg_clarity_score: row.avg_clarity_score,
            avg_friendly_score: row.avg_friendly_score,
            avg_empathy_score: row.avg_empathy_score,
            avg_total_score: row.avg_total_score,
            attempts_count: row.attempts_count,
            completed_count: row.completed_count,
            last_attempt_at: row.last_attempt_at.as_deref().map(parse_datetime),
        }
    }
}

fn parse_datetime(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
