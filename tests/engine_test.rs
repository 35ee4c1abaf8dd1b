//! Integration tests for the in-memory conversation session.

mod common;

use pretty_assertions::assert_eq;

use common::{demo_graph, demo_spec};
use convo_trainer::engine::{
    ConversationSession, OutcomeLevel, Role, ScoreTotals, SettingsPatch,
};
use convo_trainer::error::EngineError;
use convo_trainer::scenario::{Node, ScenarioGraph, Tone, TraitLevel, VariantKey};

#[test]
fn test_every_option_resolves_nonempty_text_for_all_combinations() {
    let graph = ScenarioGraph::load(demo_spec()).unwrap();

    for node in graph.nodes() {
        let Node::Choice(choice) = node else { continue };
        for option in &choice.options {
            for key in VariantKey::all() {
                let text = option.variant_text(key).unwrap_or_else(|_| {
                    panic!("option {} missing variant {}", option.key, key)
                });
                assert!(!text.trim().is_empty());
            }
        }
    }
}

#[test]
fn test_cumulative_scores_are_elementwise_sum_of_selected_options() {
    let mut session = ConversationSession::new(demo_graph());

    let first = session.select_option("opt_0_a").unwrap();
    assert_eq!(
        first.cumulative_scores,
        ScoreTotals {
            clarity: 1,
            friendly: 0,
            empathy: 0,
            total: 1
        }
    );

    let second = session.select_option("opt_1_b").unwrap();
    assert_eq!(
        second.cumulative_scores,
        ScoreTotals {
            clarity: 2,
            friendly: 1,
            empathy: 0,
            total: 3
        }
    );
    assert_eq!(session.scores(), second.cumulative_scores);
}

#[test]
fn test_reset_and_replay_reproduces_identical_transcript_and_score() {
    let mut session = ConversationSession::new(demo_graph());
    let settings = SettingsPatch {
        tone: Some(Tone::Professional),
        primary_level: Some(TraitLevel::High),
        secondary_level: Some(TraitLevel::Low),
    };

    session.update_settings(settings);
    session.select_option("opt_0_b").unwrap();
    session.select_option("opt_1_a").unwrap();
    let first_transcript = session.messages().to_vec();
    let first_scores = session.scores();
    let first_outcome = session.outcome();

    session.reset();
    assert_eq!(session.messages().len(), 1);
    assert_eq!(session.scores(), ScoreTotals::default());
    assert!(!session.settings().is_locked);

    session.update_settings(settings);
    session.select_option("opt_0_b").unwrap();
    session.select_option("opt_1_a").unwrap();

    assert_eq!(session.messages(), first_transcript.as_slice());
    assert_eq!(session.scores(), first_scores);
    assert_eq!(session.outcome(), first_outcome);
}

#[test]
fn test_settings_are_immutable_from_first_selection() {
    let mut session = ConversationSession::new(demo_graph());
    session.select_option("opt_0_a").unwrap();

    let locked = *session.settings();
    session.update_settings(SettingsPatch {
        tone: Some(Tone::Professional),
        primary_level: Some(TraitLevel::High),
        secondary_level: Some(TraitLevel::High),
    });

    assert_eq!(session.settings(), &locked);
}

#[test]
fn test_invalid_selection_is_rejected_and_state_unchanged() {
    let mut session = ConversationSession::new(demo_graph());
    session.select_option("opt_0_a").unwrap();

    let node_before = session.current_node_key().map(str::to_string);
    let messages_before = session.messages().to_vec();
    let scores_before = session.scores();

    // opt_0_a belongs to start, not to the current node
    let err = session.select_option("opt_0_a").unwrap_err();
    assert!(matches!(err, EngineError::InvalidSelection { .. }));

    assert_eq!(session.current_node_key().map(str::to_string), node_before);
    assert_eq!(session.messages(), messages_before.as_slice());
    assert_eq!(session.scores(), scores_before);
}

#[test]
fn test_end_to_end_demo_run() {
    let mut session = ConversationSession::new(demo_graph());

    let first = session.select_option("opt_0_a").unwrap();
    assert!(!first.is_completed);
    let next = first.next_options.unwrap();
    assert_eq!(next.len(), 2);
    assert_eq!(next[0].id, "opt_1_a");

    let last = session.select_option("opt_1_a").unwrap();
    assert_eq!(
        last.cumulative_scores,
        ScoreTotals {
            clarity: 1,
            friendly: 0,
            empathy: 2,
            total: 3
        }
    );
    assert!(last.is_completed);
    assert!(last.next_options.is_none());
    assert_eq!(last.outcome_level, Some(OutcomeLevel::Low));
    assert!(session.is_complete());
}

#[test]
fn test_selection_text_and_options_follow_locked_settings() {
    let mut session = ConversationSession::new(demo_graph());
    session.update_settings(SettingsPatch {
        tone: Some(Tone::Professional),
        primary_level: Some(TraitLevel::Low),
        secondary_level: Some(TraitLevel::High),
    });

    let options = session.current_options().unwrap();
    assert!(options[0].text.contains("professional-low-high"));

    let outcome = session.select_option("opt_0_a").unwrap();
    let user_line = session
        .messages()
        .iter()
        .find(|m| m.role == Role::User)
        .unwrap();
    assert!(user_line.content.contains("professional-low-high"));
    for option in outcome.next_options.unwrap() {
        assert!(option.text.contains("professional-low-high"));
    }
}

#[test]
fn test_completion_is_terminal() {
    let mut session = ConversationSession::new(demo_graph());
    session.select_option("opt_0_a").unwrap();
    session.select_option("opt_1_a").unwrap();

    let err = session.select_option("opt_1_b").unwrap_err();
    assert!(matches!(err, EngineError::AlreadyCompleted));
    assert_eq!(session.outcome(), Some(OutcomeLevel::Low));
}
