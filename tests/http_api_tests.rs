mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{Call, MockEngine, Recorder, Script};
use serde_json::{json, Value};
use tower::ServiceExt;
use voice_chat::config::ServerConfig;
use voice_chat::{create_router, AppState, BitratePolicy, SessionController};

fn app_with(script: Script) -> (Router, Recorder) {
    let (engine, recorder) = MockEngine::with_script(script);
    let controller = SessionController::new(engine, BitratePolicy::default());
    let defaults = ServerConfig {
        host: "voice.example.org".to_string(),
        port: 38592,
    };
    (create_router(AppState::new(controller, defaults)), recorder)
}

fn app() -> (Router, Recorder) {
    app_with(Script::default())
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health_check() {
    let (app, _recorder) = app();

    let (status, body) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_initial_status() {
    let (app, recorder) = app();

    let (status, body) = send(&app, "GET", "/session/status", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "disconnected");
    assert_eq!(body["bitrate"], 64000);
    assert_eq!(body["last_error"], Value::Null);
    assert_eq!(recorder.call_count(), 0);
}

#[tokio::test]
async fn test_push_to_talk_session_over_http() {
    let (app, recorder) = app();

    let (status, body) = send(
        &app,
        "POST",
        "/session/connect",
        Some(json!({"host": "127.0.0.1", "port": 9000})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "connected");
    assert_eq!(body["remote"], "127.0.0.1:9000");

    let (status, body) = send(&app, "POST", "/session/transmit/begin", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "transmitting");

    let (status, body) = send(
        &app,
        "PUT",
        "/session/bitrate",
        Some(json!({"bitrate": 32000})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bitrate"], 32000);
    assert_eq!(body["state"], "transmitting");

    let (status, body) = send(&app, "POST", "/session/transmit/end", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "connected");

    let (status, body) = send(&app, "POST", "/session/disconnect", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "disconnected");

    assert_eq!(recorder.destroys(), 1);
}

#[tokio::test]
async fn test_connect_without_body_uses_configured_server() {
    let (app, recorder) = app();

    let (status, body) = send(&app, "POST", "/session/connect", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["remote"], "voice.example.org:38592");
    assert_eq!(
        recorder.calls()[0],
        Call::Create("voice.example.org".to_string(), 38592)
    );
}

#[tokio::test]
async fn test_connect_with_port_only() {
    let (app, recorder) = app();

    let (status, _) = send(&app, "POST", "/session/connect", Some(json!({"port": 9100}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        recorder.calls()[0],
        Call::Create("voice.example.org".to_string(), 9100)
    );
}

#[tokio::test]
async fn test_connect_twice_conflicts() {
    let (app, recorder) = app();
    send(&app, "POST", "/session/connect", None).await;

    let (status, body) = send(&app, "POST", "/session/connect", None).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"]["state"], "connected");
    assert_eq!(recorder.creates(), 1);
}

#[tokio::test]
async fn test_start_failure_is_bad_gateway() {
    let (app, recorder) = app_with(Script {
        start_code: 5,
        ..Script::default()
    });

    let (status, body) = send(&app, "POST", "/session/connect", None).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("code 5"));
    assert_eq!(body["status"]["state"], "disconnected");
    assert_eq!(recorder.destroys(), 1);
}

#[tokio::test]
async fn test_bitrate_errors() {
    let (app, _recorder) = app();

    let (status, _) = send(&app, "PUT", "/session/bitrate", Some(json!({"bitrate": 32000}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    send(&app, "POST", "/session/connect", None).await;

    let (status, body) = send(&app, "PUT", "/session/bitrate", Some(json!({"bitrate": 48000}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"]["bitrate"], 64000);
}

#[tokio::test]
async fn test_rejected_bitrate_reports_previous_value() {
    let (app, _recorder) = app_with(Script {
        reject_bitrate: Some((32000, -11)),
        ..Script::default()
    });
    send(&app, "POST", "/session/connect", None).await;

    let (status, body) = send(&app, "PUT", "/session/bitrate", Some(json!({"bitrate": 32000}))).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["status"]["bitrate"], 64000);

    let (_, body) = send(&app, "GET", "/session/status", None).await;
    assert_eq!(body["bitrate"], 64000);
    assert!(body["last_error"].as_str().unwrap().contains("code -11"));
}

#[tokio::test]
async fn test_transmit_while_disconnected_is_ignored() {
    let (app, recorder) = app();

    let (status, body) = send(&app, "POST", "/session/transmit/begin", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "disconnected");
    assert_eq!(recorder.call_count(), 0);
}

#[tokio::test]
async fn test_connection_monitor_tears_down_dead_session() {
    let (engine, recorder) = MockEngine::new();
    let state = AppState::new(
        SessionController::new(engine, BitratePolicy::default()),
        ServerConfig::default(),
    );
    let app = create_router(state.clone());
    let monitor = voice_chat::http::spawn_connection_monitor(
        state.clone(),
        std::time::Duration::from_millis(10),
    );

    send(&app, "POST", "/session/connect", None).await;
    recorder.set_alive(false);

    let mut state_name = Value::Null;
    for _ in 0..100 {
        let (_, body) = send(&app, "GET", "/session/status", None).await;
        state_name = body["state"].clone();
        if state_name == "disconnected" {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    monitor.abort();

    assert_eq!(state_name, "disconnected");
    assert_eq!(recorder.destroys(), 1);

    let (_, body) = send(&app, "GET", "/session/status", None).await;
    assert!(body["last_error"].as_str().unwrap().contains("lost"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_status_readable_while_connect_is_running() {
    let (app, recorder) = app_with(Script {
        start_delay: Some(std::time::Duration::from_millis(1500)),
        ..Script::default()
    });

    let connecting = {
        let app = app.clone();
        tokio::spawn(async move {
            send(
                &app,
                "POST",
                "/session/connect",
                Some(json!({"host": "127.0.0.1", "port": 9000})),
            )
            .await
        })
    };
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let (status, body) = tokio::time::timeout(
        std::time::Duration::from_millis(500),
        send(&app, "GET", "/session/status", None),
    )
    .await
    .expect("status read must not wait for the running connect");

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "connecting");

    let (status, body) = connecting.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "connected");
    assert_eq!(recorder.creates(), 1);

    let (_, body) = send(&app, "GET", "/session/status", None).await;
    assert_eq!(body["state"], "connected");
}

#[tokio::test]
async fn test_malformed_connect_body_is_rejected() {
    let (app, recorder) = app();

    let (status, body) = send(
        &app,
        "POST",
        "/session/connect",
        Some(json!({"host": "127.0.0.1", "port": 70000})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("invalid connect request"));
    assert_eq!(body["status"]["state"], "disconnected");

    let (status, _) = send(
        &app,
        "POST",
        "/session/connect",
        Some(json!({"host": 42, "port": 9000})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method("POST")
        .uri("/session/connect")
        .header("content-type", "application/json")
        .body(Body::from("{\"host\": "))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Nothing was connected on the caller's behalf
    assert_eq!(recorder.call_count(), 0);
}
