//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use serde_json::json;

use convo_trainer::auth::AuthUser;
use convo_trainer::scenario::{ScenarioGraph, ScenarioSpec, VariantKey};
use convo_trainer::storage::{SqliteStorage, Storage};

/// An 8-entry variant table whose texts embed the variant key, so tests can
/// assert which phrasing was resolved.
pub fn variants(prefix: &str) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for key in VariantKey::all() {
        map.insert(key.to_string(), json!(format!("{} ({})", prefix, key)));
    }
    serde_json::Value::Object(map)
}

/// A compact two-pick scenario: `start` offers +1 clarity or a softer
/// alternative, `choice_1` offers +2 empathy, and both paths end at the
/// terminal node.
pub fn demo_spec() -> ScenarioSpec {
    serde_json::from_value(json!({
        "slug": "demo",
        "title": "Demo Scenario",
        "icon": "CreditCard",
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
        "system_message": "You are speaking with Claudia about an unexpected charge.",
        "opening_message": "Hi, I need to talk to someone about billing #123456.",
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
                "content": "It's the $149.99 from the 3rd. I never signed up for that.",
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
                        "text": variants("refund in full")
                    },
                    {
                        "key": "opt_1_b",
                        "order_index": 1,
                        "scores": { "clarity": 1, "friendly": 1, "empathy": 0 },
                        "next": "end_node",
                        "text": variants("offer account credit")
                    }
                ]
            },
            {
                "node_type": "response",
                "key": "end_node",
                "content": "Okay. Thank you for sorting it out.",
                "next": "complete"
            }
        ]
    }))
    .expect("demo spec should deserialize")
}

/// The demo scenario as a validated in-memory graph.
pub fn demo_graph() -> Arc<ScenarioGraph> {
    Arc::new(ScenarioGraph::load(demo_spec()).expect("demo spec should validate"))
}

/// In-memory storage seeded with the demo scenario.
pub async fn seeded_storage() -> SqliteStorage {
    let storage = SqliteStorage::new_in_memory()
        .await
        .expect("Failed to create in-memory storage");
    let graph = ScenarioGraph::load(demo_spec()).expect("demo spec should validate");
    storage
        .seed_scenario(&graph)
        .await
        .expect("Failed to seed demo scenario");
    storage
}

/// The test caller.
pub fn test_user() -> AuthUser {
    AuthUser {
        user_id: "user-1".to_string(),
    }
}
