use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::scenario::{
    ChoiceNode, DialogueOption, NodeRef, ScenarioGraph, ScoreDelta, Tone, TraitLevel, VariantKey,
    START_NODE_KEY,
};

use super::score::{OutcomeLevel, ScoreTotals};

/// Persona settings for one conversation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Reply tone.
    pub tone: Tone,
    /// Level of the scenario's primary trait.
    pub primary_level: TraitLevel,
    /// Level of the scenario's secondary trait.
    pub secondary_level: TraitLevel,
    /// Whether the settings are locked for the rest of the attempt.
    ///
    /// Flips to `true` exactly once, as an effect of the first selection,
    /// and only `reset` clears it.
    pub is_locked: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tone: Tone::Friendly,
            primary_level: TraitLevel::Low,
            secondary_level: TraitLevel::Low,
            is_locked: false,
        }
    }
}

impl Settings {
    /// The variant key these settings select.
    pub fn variant_key(&self) -> VariantKey {
        VariantKey::new(self.tone, self.primary_level, self.secondary_level)
    }
}

/// Partial settings update applied while unlocked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsPatch {
    /// New tone, if changing.
    pub tone: Option<Tone>,
    /// New primary trait level, if changing.
    pub primary_level: Option<TraitLevel>,
    /// New secondary trait level, if changing.
    pub secondary_level: Option<TraitLevel>,
}

/// Who spoke a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The persona.
    Ai,
    /// The trainee.
    User,
}

/// One line of the conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Speaker.
    pub role: Role,
    /// The spoken line.
    pub content: String,
    /// Raw score deltas of the chosen option, on trainee lines only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<ScoreDelta>,
}

/// Where a session currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the trainee to pick an option at the named choice node.
    AwaitingChoice {
        /// Current choice node key.
        node_key: String,
    },
    /// The attempt reached a terminal node. No transition leaves this state
    /// except an explicit reset.
    Complete {
        /// The tier the attempt classified into, computed exactly once.
        outcome: OutcomeLevel,
    },
}

/// An option as presented to the trainee, with its resolved phrasing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayOption {
    /// Option key.
    pub id: String,
    /// Phrasing under the active settings.
    pub text: String,
    /// Display order.
    pub order_index: i64,
    /// Raw score deltas (surfaced to the client for score previews).
    pub scores: ScoreDelta,
}

/// A follow-up option in a step result, shaped like the network contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextOption {
    /// Option key.
    pub id: String,
    /// Phrasing under the attempt's locked settings.
    pub text: String,
    /// Display order.
    pub order_index: i64,
}

/// The display state emitted by one successful selection.
///
/// Both the in-memory session and the server-authoritative adapter produce
/// this shape, so scripted runs can be compared across backing stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    /// The persona's response line.
    pub ai_response: String,
    /// Options of the next choice node, or `None` when completed.
    pub next_options: Option<Vec<NextOption>>,
    /// The chosen option's raw deltas.
    pub step_scores: ScoreDelta,
    /// Totals after this step.
    pub cumulative_scores: ScoreTotals,
    /// Whether the attempt reached a terminal node.
    pub is_completed: bool,
    /// Outcome tier, present exactly when completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome_level: Option<OutcomeLevel>,
}

/// In-memory conversation state machine over a validated scenario graph.
///
/// Single-threaded and synchronous; one session per open scenario. The
/// state sequence is `AwaitingChoice(node)* -> Complete(tier)`, with
/// `reset` as the only way back.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    graph: Arc<ScenarioGraph>,
    settings: Settings,
    state: SessionState,
    selected_options: Vec<DialogueOption>,
    messages: Vec<ChatMessage>,
}

impl ConversationSession {
    /// Open a session at the graph's start node, with the persona's opening
    /// message already in the transcript.
    pub fn new(graph: Arc<ScenarioGraph>) -> Self {
        let opening = ChatMessage {
            role: Role::Ai,
            content: graph.opening_message.clone(),
            scores: None,
        };
        Self {
            graph,
            settings: Settings::default(),
            state: SessionState::AwaitingChoice {
                node_key: START_NODE_KEY.to_string(),
            },
            selected_options: Vec::new(),
            messages: vec![opening],
        }
    }

    /// The active settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The current machine state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The transcript so far.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Derived totals over all selections of this attempt.
    pub fn scores(&self) -> ScoreTotals {
        ScoreTotals::from_deltas(self.selected_options.iter().map(|opt| &opt.scores))
    }

    /// Whether the attempt reached a terminal node.
    pub fn is_complete(&self) -> bool {
        matches!(self.state, SessionState::Complete { .. })
    }

    /// The outcome tier, once complete.
    pub fn outcome(&self) -> Option<OutcomeLevel> {
        match self.state {
            SessionState::Complete { outcome } => Some(outcome),
            SessionState::AwaitingChoice { .. } => None,
        }
    }

    /// Key of the choice node awaiting a selection, if any.
    pub fn current_node_key(&self) -> Option<&str> {
        match &self.state {
            SessionState::AwaitingChoice { node_key } => Some(node_key),
            SessionState::Complete { .. } => None,
        }
    }

    /// Merge a settings patch. Silently ignored once locked.
    pub fn update_settings(&mut self, patch: SettingsPatch) {
        if self.settings.is_locked {
            return;
        }
        if let Some(tone) = patch.tone {
            self.settings.tone = tone;
        }
        if let Some(level) = patch.primary_level {
            self.settings.primary_level = level;
        }
        if let Some(level) = patch.secondary_level {
            self.settings.secondary_level = level;
        }
    }

    /// The options currently on offer, phrased under the active settings.
    /// Empty once complete.
    pub fn current_options(&self) -> EngineResult<Vec<DisplayOption>> {
        let node_key = match &self.state {
            SessionState::AwaitingChoice { node_key } => node_key,
            SessionState::Complete { .. } => return Ok(Vec::new()),
        };
        let choice = self.graph.choice(node_key)?;
        let variant_key = self.settings.variant_key();

        let mut options = Vec::with_capacity(choice.options.len());
        for option in &choice.options {
            options.push(DisplayOption {
                id: option.key.clone(),
                text: option.variant_text(variant_key)?.to_string(),
                order_index: option.order_index,
                scores: option.scores,
            });
        }
        options.sort_by_key(|opt| opt.order_index);
        Ok(options)
    }

    /// Apply one selection.
    ///
    /// Locks the settings on the first selection, appends the trainee and
    /// persona transcript lines, accumulates the score, and advances the
    /// node pointer (or completes the attempt and classifies its outcome).
    /// Every fallible lookup happens before any mutation, so a failed step
    /// leaves the session exactly as it was.
    pub fn select_option(&mut self, option_key: &str) -> EngineResult<StepOutcome> {
        let node_key = match &self.state {
            SessionState::Complete { .. } => return Err(EngineError::AlreadyCompleted),
            SessionState::AwaitingChoice { node_key } => node_key.clone(),
        };
        let variant_key = self.settings.variant_key();

        let (option, user_text, response_content, follow) = {
            let choice = self.graph.choice(&node_key)?;
            let option =
                choice
                    .option(option_key)
                    .ok_or_else(|| EngineError::InvalidSelection {
                        option_key: option_key.to_string(),
                        node_key: node_key.clone(),
                    })?;
            let user_text = option.variant_text(variant_key)?.to_string();
            let response_key = option.next.key().ok_or_else(|| EngineError::Integrity {
                message: format!("option {} jumps straight to completion", option.key),
            })?;
            let response = self.graph.response(response_key)?;
            let follow = match &response.next {
                NodeRef::Complete => None,
                NodeRef::Node(next_key) => {
                    let next_choice = self.graph.choice(next_key)?;
                    Some((next_key.clone(), resolve_options(next_choice, variant_key)?))
                }
            };
            (
                option.clone(),
                user_text,
                response.content.clone(),
                follow,
            )
        };

        self.settings.is_locked = true;
        let step_scores = option.scores;
        self.messages.push(ChatMessage {
            role: Role::User,
            content: user_text,
            scores: Some(step_scores),
        });
        self.messages.push(ChatMessage {
            role: Role::Ai,
            content: response_content.clone(),
            scores: None,
        });
        self.selected_options.push(option);
        let cumulative_scores = self.scores();

        let (next_options, outcome_level) = match follow {
            None => {
                let outcome = OutcomeLevel::classify(cumulative_scores.total);
                self.state = SessionState::Complete { outcome };
                (None, Some(outcome))
            }
            Some((next_key, options)) => {
                self.state = SessionState::AwaitingChoice { node_key: next_key };
                (Some(options), None)
            }
        };

        Ok(StepOutcome {
            ai_response: response_content,
            next_options,
            step_scores,
            cumulative_scores,
            is_completed: outcome_level.is_some(),
            outcome_level,
        })
    }

    /// Start a fresh attempt: back to the start node, settings unlocked and
    /// defaulted, scores zeroed, transcript reduced to the opening message.
    pub fn reset(&mut self) {
        self.settings = Settings::default();
        self.state = SessionState::AwaitingChoice {
            node_key: START_NODE_KEY.to_string(),
        };
        self.selected_options.clear();
        self.messages.clear();
        self.messages.push(ChatMessage {
            role: Role::Ai,
            content: self.graph.opening_message.clone(),
            scores: None,
        });
    }
}

fn resolve_options(choice: &ChoiceNode, variant_key: VariantKey) -> EngineResult<Vec<NextOption>> {
    let mut options = Vec::with_capacity(choice.options.len());
    for option in &choice.options {
        options.push(NextOption {
            id: option.key.clone(),
            text: option.variant_text(variant_key)?.to_string(),
            order_index: option.order_index,
        });
    }
    options.sort_by_key(|opt| opt.order_index);
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn variants(prefix: &str) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for key in VariantKey::all() {
            map.insert(key.to_string(), json!(format!("{} ({})", prefix, key)));
        }
        serde_json::Value::Object(map)
    }

    fn graph() -> Arc<ScenarioGraph> {
        let spec: crate::scenario::ScenarioSpec = serde_json::from_value(json!({
            "slug": "demo",
            "title": "Demo",
            "order_index": 0,
            "primary_trait": "agreeableness",
            "secondary_trait": "neuroticism",
            "persona": {
                "name": "Claudia",
                "role": "Frustrated Customer",
                "call_id": "123456",
                "service": "Billing",
                "subject": "Refund Request",
                "notes": "Upset about an unexpected charge.",
                "ocean": {
                    "openness": 45,
                    "conscientiousness": 60,
                    "extraversion": 55,
                    "agreeableness": 30,
                    "neuroticism": 70
                }
            },
            "system_message": "You are speaking with Claudia.",
            "opening_message": "I need to talk to someone about billing #123456.",
            "nodes": [
                {
                    "node_type": "choice",
                    "key": "start",
                    "level": 0,
                    "options": [
                        {
                            "key": "opt_0_a",
                            "order_index": 0,
                            "scores": { "clarity": 1, "friendly": 0, "empathy": 0 },
                            "next": "response_1",
                            "text": variants("check the charge")
                        },
                        {
                            "key": "opt_0_b",
                            "order_index": 1,
                            "scores": { "clarity": 0, "friendly": 1, "empathy": 1 },
                            "next": "response_1",
                            "text": variants("ask what happened")
                        }
                    ]
                },
                {
                    "node_type": "response",
                    "key": "response_1",
                    "content": "It was charged twice on the 3rd.",
                    "next": "choice_1"
                },
                {
                    "node_type": "choice",
                    "key": "choice_1",
                    "level": 1,
                    "options": [
                        {
                            "key": "opt_1_a",
                            "order_index": 0,
                            "scores": { "clarity": 0, "friendly": 0, "empathy": 2 },
                            "next": "end_node",
                            "text": variants("refund both")
                        }
                    ]
                },
                {
                    "node_type": "response",
                    "key": "end_node",
                    "content": "Thank you, that resolves it.",
                    "next": "complete"
                }
            ]
        }))
        .unwrap();
        Arc::new(ScenarioGraph::load(spec).unwrap())
    }

    #[test]
    fn test_new_session_has_opening_message() {
        let session = ConversationSession::new(graph());
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].role, Role::Ai);
        assert_eq!(session.current_node_key(), Some("start"));
        assert!(!session.settings().is_locked);
    }

    #[test]
    fn test_first_selection_locks_settings() {
        let mut session = ConversationSession::new(graph());
        session.update_settings(SettingsPatch {
            tone: Some(Tone::Professional),
            ..Default::default()
        });
        assert_eq!(session.settings().tone, Tone::Professional);

        session.select_option("opt_0_a").unwrap();
        assert!(session.settings().is_locked);

        session.update_settings(SettingsPatch {
            tone: Some(Tone::Friendly),
            ..Default::default()
        });
        assert_eq!(session.settings().tone, Tone::Professional);
    }

    #[test]
    fn test_invalid_selection_leaves_state_unchanged() {
        let mut session = ConversationSession::new(graph());
        let before_messages = session.messages().to_vec();
        let before_scores = session.scores();

        let err = session.select_option("opt_9_z").unwrap_err();
        assert!(matches!(err, EngineError::InvalidSelection { .. }));
        assert_eq!(session.messages(), before_messages.as_slice());
        assert_eq!(session.scores(), before_scores);
        assert_eq!(session.current_node_key(), Some("start"));
        assert!(!session.settings().is_locked);
    }

    #[test]
    fn test_completion_is_terminal_until_reset() {
        let mut session = ConversationSession::new(graph());
        session.select_option("opt_0_a").unwrap();
        let outcome = session.select_option("opt_1_a").unwrap();
        assert!(outcome.is_completed);
        assert_eq!(outcome.outcome_level, Some(OutcomeLevel::Low));

        let err = session.select_option("opt_1_a").unwrap_err();
        assert!(matches!(err, EngineError::AlreadyCompleted));

        session.reset();
        assert_eq!(session.current_node_key(), Some("start"));
        assert_eq!(session.scores(), ScoreTotals::default());
        assert!(!session.settings().is_locked);
        assert_eq!(session.messages().len(), 1);
    }

    #[test]
    fn test_selected_text_follows_locked_settings() {
        let mut session = ConversationSession::new(graph());
        session.update_settings(SettingsPatch {
            tone: Some(Tone::Professional),
            primary_level: Some(TraitLevel::High),
            secondary_level: None,
        });

        session.select_option("opt_0_b").unwrap();
        let user_line = &session.messages()[1];
        assert_eq!(user_line.role, Role::User);
        assert!(user_line.content.contains("professional-high-low"));
    }
}
