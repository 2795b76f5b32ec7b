//! API endpoint integration tests

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use base64::Engine;
use serde_json::Value;
use sommelier::SessionStore;
use sommelier::api::ApiServerBuilder;
use sommelier::orchestrator::TRANSCRIPTION_FAILED_MESSAGE;
use tower::ServiceExt;

mod common;
use common::{TestOrchestrator, dir_is_empty, test_orchestrator};

/// Build a test API router
fn build_test_router(harness: &TestOrchestrator) -> Router {
    ApiServerBuilder::new(harness.orchestrator.clone(), 0)
        .build()
        .router()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

async fn create_session(app: &Router) -> String {
    let (status, json) = send(
        app,
        Request::builder()
            .method("POST")
            .uri("/api/sessions")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json["id"].as_str().unwrap().to_string()
}

fn text_request(id: &str, text: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/api/sessions/{id}/text"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::json!({ "text": text }).to_string()))
        .unwrap()
}

fn voice_request(id: &str, query: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/api/sessions/{id}/voice{query}"))
        .header(header::CONTENT_TYPE, "audio/webm;codecs=opus")
        .body(Body::from(vec![7u8; 256]))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let harness = test_orchestrator(None, false);
    let app = build_test_router(&harness);

    let (status, json) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_index_serves_widget() {
    let harness = test_orchestrator(None, false);
    let app = build_test_router(&harness);

    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("Asistente de Vinos"));
}

#[tokio::test]
async fn test_text_turns_build_transcript() {
    let harness = test_orchestrator(None, false);
    let app = build_test_router(&harness);
    let id = create_session(&app).await;

    let (status, json) = send(&app, text_request(&id, "¿Qué vino va con salmón?")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"]["role"], "user");
    assert_eq!(json["user"]["content"], "¿Qué vino va con salmón?");
    assert_eq!(json["assistant"]["role"], "assistant");
    assert_eq!(json["assistant"]["content"], "respuesta 0");
    assert!(json.get("audio").is_none());

    send(&app, text_request(&id, "¿Y un tinto?")).await;

    let (status, json) = send(&app, get(&format!("/api/sessions/{id}/messages"))).await;
    assert_eq!(status, StatusCode::OK);
    let roles: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["role"].as_str().unwrap())
        .collect();
    assert_eq!(roles, ["user", "assistant", "user", "assistant"]);
}

#[tokio::test]
async fn test_blank_text_is_no_content() {
    let harness = test_orchestrator(None, false);
    let app = build_test_router(&harness);
    let id = create_session(&app).await;

    let (status, _) = send(&app, text_request(&id, "   ")).await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(harness.completer.calls(), 0);
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let harness = test_orchestrator(None, false);
    let app = build_test_router(&harness);
    let id = uuid::Uuid::new_v4().to_string();

    let (status, json) = send(&app, text_request(&id, "hola")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_completion_failure_is_bad_gateway() {
    let harness = test_orchestrator(None, true);
    let app = build_test_router(&harness);
    let id = create_session(&app).await;

    let (status, json) = send(&app, text_request(&id, "hola")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"]["code"], "completion_failed");

    let (_, json) = send(&app, get(&format!("/api/sessions/{id}/messages"))).await;
    assert!(json.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_voice_turn_returns_audio() {
    let harness = test_orchestrator(Some("¿Qué vino va con paella?"), false);
    let app = build_test_router(&harness);
    let id = create_session(&app).await;

    let (status, json) = send(&app, voice_request(&id, "")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"]["content"], "¿Qué vino va con paella?");
    assert_eq!(json["audio"]["mime"], "audio/mpeg");

    let audio = base64::engine::general_purpose::STANDARD
        .decode(json["audio"]["data"].as_str().unwrap())
        .unwrap();
    assert_eq!(audio, b"respuesta 0");
    assert!(dir_is_empty(harness.dir.path()));
}

#[tokio::test]
async fn test_voice_turn_without_speech() {
    let harness = test_orchestrator(Some("hola"), false);
    let app = build_test_router(&harness);
    let id = create_session(&app).await;

    let (status, json) = send(&app, voice_request(&id, "?speak=false")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(json.get("audio").is_none());
}

#[tokio::test]
async fn test_failed_transcription_reports_message() {
    let harness = test_orchestrator(None, false);
    let app = build_test_router(&harness);
    let id = create_session(&app).await;

    let (status, json) = send(&app, voice_request(&id, "")).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"]["code"], "transcription_failed");
    assert_eq!(json["error"]["message"], TRANSCRIPTION_FAILED_MESSAGE);
    assert_eq!(harness.completer.calls(), 0);
    assert!(dir_is_empty(harness.dir.path()));

    let (_, json) = send(&app, get(&format!("/api/sessions/{id}/messages"))).await;
    assert!(json.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_recording_is_no_content() {
    let harness = test_orchestrator(Some("hola"), false);
    let app = build_test_router(&harness);
    let id = create_session(&app).await;

    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/sessions/{id}/voice"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(harness.completer.calls(), 0);
}

#[tokio::test]
async fn test_reset_clears_transcript() {
    let harness = test_orchestrator(None, false);
    let app = build_test_router(&harness);
    let id = create_session(&app).await;
    send(&app, text_request(&id, "hola")).await;

    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/sessions/{id}/reset"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, json) = send(&app, get(&format!("/api/sessions/{id}/messages"))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_session() {
    let harness = test_orchestrator(None, false);
    let app = build_test_router(&harness);
    let id = create_session(&app).await;

    let delete = |id: &str| {
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/sessions/{id}"))
            .body(Body::empty())
            .unwrap()
    };

    let (status, _) = send(&app, delete(&id)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, delete(&id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, get(&format!("/api/sessions/{id}/messages"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_idle_session_expires() {
    let harness = test_orchestrator(None, false);
    let app = ApiServerBuilder::new(harness.orchestrator.clone(), 0)
        .sessions(Arc::new(SessionStore::new(Duration::from_millis(100))))
        .build()
        .router();
    let id = create_session(&app).await;

    tokio::time::sleep(Duration::from_millis(250)).await;

    let (status, json) = send(&app, get(&format!("/api/sessions/{id}/messages"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "not_found");
}
