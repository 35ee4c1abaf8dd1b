//! Endpoint tests for the HTTP surface.

mod common;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use common::seeded_storage;
use convo_trainer::auth::StaticTokenVerifier;
use convo_trainer::config::{
    AuthConfig, Config, ContentConfig, DatabaseConfig, LogFormat, LoggingConfig, ServerConfig,
};
use convo_trainer::server::{router, AppState};

const TEST_TOKEN: &str = "test-token";

fn test_config() -> Config {
    Config {
        server: ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
        },
        database: DatabaseConfig {
            path: PathBuf::from(":memory:"),
            max_connections: 1,
        },
        logging: LoggingConfig {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        },
        auth: AuthConfig {
            tokens: HashMap::from([(TEST_TOKEN.to_string(), "user-1".to_string())]),
        },
        content: ContentConfig {
            fixtures_dir: PathBuf::from("./fixtures"),
        },
    }
}

async fn test_app() -> Router {
    let config = test_config();
    let storage = seeded_storage().await;
    let verifier = Arc::new(StaticTokenVerifier::new(config.auth.tokens.clone()));
    router(Arc::new(AppState::new(config, storage, verifier)))
}

fn authed_post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", TEST_TOKEN))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authed_get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", TEST_TOKEN))
        .body(Body::empty())
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_missing_or_invalid_token_is_uniform_401() {
    let app = test_app().await;

    let bare = Request::builder()
        .method("GET")
        .uri("/scenarios")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(bare).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let wrong = Request::builder()
        .method("POST")
        .uri("/select-option")
        .header(header::AUTHORIZATION, "Bearer wrong-token")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = app.clone().oneshot(wrong).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = response_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("bearer token"));
}

#[tokio::test]
async fn test_start_conversation_validation_statuses() {
    let app = test_app().await;

    let invalid_tone = authed_post(
        "/start-conversation",
        json!({
            "scenario_slug": "demo",
            "tone": "casual",
            "primary_level": "low",
            "secondary_level": "low"
        }),
    );
    let response = app.clone().oneshot(invalid_tone).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let unknown_scenario = authed_post(
        "/start-conversation",
        json!({
            "scenario_slug": "missing",
            "tone": "friendly",
            "primary_level": "low",
            "secondary_level": "low"
        }),
    );
    let response = app.clone().oneshot(unknown_scenario).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_scenarios_listing() {
    let app = test_app().await;

    let response = app.clone().oneshot(authed_get("/scenarios")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["scenarios"][0]["slug"], "demo");
    assert_eq!(body["scenarios"][0]["persona"]["name"], "Claudia");
}

#[tokio::test]
async fn test_full_conversation_over_http() {
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(authed_post(
            "/start-conversation",
            json!({
                "scenario_slug": "demo",
                "tone": "friendly",
                "primary_level": "low",
                "secondary_level": "high"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let started = response_json(response).await;
    let conversation_id = started["conversation_id"].as_str().unwrap().to_string();
    assert_eq!(started["initial_options"].as_array().unwrap().len(), 2);
    assert!(started["initial_options"][0]["text"]
        .as_str()
        .unwrap()
        .contains("friendly-low-high"));

    let response = app
        .clone()
        .oneshot(authed_post(
            "/select-option",
            json!({ "conversation_id": &conversation_id, "option_id": "opt_0_a" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let step = response_json(response).await;
    assert_eq!(step["is_completed"], false);
    assert_eq!(step["step_scores"]["clarity"], 1);
    assert_eq!(step["cumulative_scores"]["total"], 1);
    assert!(step["next_options"].is_array());
    assert!(step.get("outcome_level").is_none());

    let response = app
        .clone()
        .oneshot(authed_post(
            "/select-option",
            json!({ "conversation_id": &conversation_id, "option_id": "opt_1_a" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let last = response_json(response).await;
    assert_eq!(last["is_completed"], true);
    assert_eq!(last["outcome_level"], "low");
    assert_eq!(last["cumulative_scores"]["total"], 3);
    assert!(last["next_options"].is_null());

    // Selecting after completion is a client error
    let response = app
        .clone()
        .oneshot(authed_post(
            "/select-option",
            json!({ "conversation_id": &conversation_id, "option_id": "opt_1_b" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Fold the attempt into the aggregate, then read it back
    let response = app
        .clone()
        .oneshot(authed_post(
            "/update-scores",
            json!({ "conversation_id": &conversation_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["success"], true);

    let response = app
        .clone()
        .oneshot(authed_get("/get-scores?scenario_slug=demo"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let scores = response_json(response).await;
    assert_eq!(scores["best_scores"]["total"], 3);
    assert_eq!(scores["best_scores"]["outcome_level"], "low");
    assert_eq!(scores["statistics"]["completed"], 1);
}

#[tokio::test]
async fn test_select_option_missing_option_id_is_400() {
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(authed_post("/select-option", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("option_id"));
}

#[tokio::test]
async fn test_unknown_conversation_is_404() {
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(authed_post(
            "/select-option",
            json!({ "conversation_id": "no-such-id", "option_id": "opt_0_a" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
