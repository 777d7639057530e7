//! Integration tests for the edgeway gateway
//!
//! These tests drive the full router (and, for the lifecycle tests, a real socket) the way an
//! OpenAI-compatible client would.

use axum::http::StatusCode;
use edgeway::bridge::InferenceBridge;
use edgeway::engine::InferenceError;
use edgeway::lifecycle::{GatewayController, GatewayOptions, GatewayStatus, LifecycleError};
use edgeway::models::ResponseFormat;
use edgeway::registry::{SharedRegistry, StaticRegistry};
use edgeway::test_utils::StubEngine;
use edgeway::{AppState, build_router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt; // for oneshot()

fn chat_request(body: serde_json::Value) -> axum::http::Request<axum::body::Body> {
    axum::http::Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

#[tokio::test]
async fn test_worked_example() {
    let engine = StubEngine::new(|prompt| match prompt {
        "2+2?" => Ok("4".into()),
        other => Err(InferenceError::new(format!("unexpected prompt {other}"))),
    });
    let state = AppState::new(
        InferenceBridge::new(Arc::new(engine.clone())),
        Arc::new(StaticRegistry::new(["gemma"])),
    );
    let app = build_router(state);

    let response = app
        .oneshot(chat_request(json!({
            "model": "gemma",
            "messages": [{"role": "user", "content": [{"text": "2+2?"}]}],
            "max_tokens": 16
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "text/plain; charset=utf-8"
    );
    assert_eq!(body_bytes(response).await, b"4");
    assert_eq!(engine.calls().len(), 1);
}

#[tokio::test]
async fn test_multimodal_request_forwards_first_image() {
    let engine = StubEngine::replying("a cat on a mat");
    let state = AppState::new(
        InferenceBridge::new(Arc::new(engine.clone())),
        Arc::new(StaticRegistry::default()),
    );
    let app = build_router(state);

    let response = app
        .oneshot(chat_request(json!({
            "model": "gemma-3n",
            "messages": [
                {"role": "system", "content": [{"image_url": {"url": "data:image/jpeg;base64,/9j/4AAQ"}}]},
                {"role": "user", "content": [
                    {"type": "image_url", "image_url": {"url": "https://example.com/ignored.png"}},
                    {"type": "text", "text": "What is in the picture?"},
                    {"type": "text", "text": "Answer briefly."}
                ]}
            ]
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"a cat on a mat");

    let calls = engine.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].model, "gemma-3n");
    assert_eq!(calls[0].prompt, "What is in the picture?");
    assert_eq!(calls[0].image_refs, ["data:image/jpeg;base64,/9j/4AAQ"]);
}

#[tokio::test]
async fn test_requests_are_independent() {
    let engine = StubEngine::new(|prompt| Ok(format!("[{prompt}]")));
    let state = AppState::new(
        InferenceBridge::new(Arc::new(engine.clone())),
        Arc::new(StaticRegistry::default()),
    );
    let app = build_router(state);

    for prompt in ["one", "two", "three"] {
        let response = app
            .clone()
            .oneshot(chat_request(json!({
                "model": "gemma",
                "messages": [{"role": "user", "content": [{"text": prompt}]}]
            })))
            .await
            .unwrap();
        assert_eq!(body_bytes(response).await, format!("[{prompt}]").as_bytes());
    }

    let prompts: Vec<String> = engine.calls().into_iter().map(|c| c.prompt).collect();
    assert_eq!(prompts, ["one", "two", "three"]);
}

#[tokio::test]
async fn test_openai_envelope_over_socket() {
    let registry = SharedRegistry::new(["gemma"]);
    let options = GatewayOptions::builder()
        .bind_addr(SocketAddr::from(([127, 0, 0, 1], 0)))
        .response_format(ResponseFormat::OpenAi)
        .shutdown_grace(Duration::from_millis(200))
        .build();
    let controller = GatewayController::new(options, Arc::new(registry.clone()));
    let addr = controller
        .start(Arc::new(StubEngine::replying("hello there")))
        .await
        .unwrap();
    let client = reqwest::Client::builder().no_proxy().build().unwrap();

    let body: serde_json::Value = client
        .post(format!("http://{addr}/v1/chat/completions"))
        .json(&json!({"model": "gemma", "messages": [{"role": "user", "content": "hi"}]}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["choices"][0]["message"]["content"], "hello there");

    registry.push("phi");
    let body: serde_json::Value = client
        .get(format!("http://{addr}/v1/models"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"][0]["id"], "gemma");
    assert_eq!(body["data"][1]["id"], "phi");

    let response = client
        .get(format!("http://{addr}/v1/unknown"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert!(controller.stop().await);
}

#[tokio::test]
async fn test_controller_lifecycle() {
    let options = GatewayOptions::builder()
        .bind_addr(SocketAddr::from(([127, 0, 0, 1], 0)))
        .shutdown_grace(Duration::from_millis(200))
        .build();
    let controller = GatewayController::new(options, Arc::new(StaticRegistry::default()));
    let engine = Arc::new(StubEngine::replying("ok"));

    assert_eq!(controller.status().await, GatewayStatus::Stopped);
    let addr = controller.start(engine.clone()).await.unwrap();
    assert!(matches!(
        controller.start(engine.clone()).await,
        Err(LifecycleError::AlreadyRunning(a)) if a == addr
    ));

    assert!(controller.stop().await);
    assert!(!controller.stop().await);
    assert_eq!(controller.status().await, GatewayStatus::Stopped);
}
