//! api.ai client against a local stand-in server.
//!
//! Each test spins up an Axum server on a random port that mimics the
//! `/query` endpoint and records what the client sent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Json, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use intent_bridge::config::NluConfig;
use intent_bridge::error::NluError;
use intent_bridge::nlu::{ApiAiClient, NluClient, OriginalRequest, TextRequest};

#[derive(Debug, Clone)]
struct Captured {
    version: Option<String>,
    authorization: Option<String>,
    body: Value,
}

type Captures = Arc<Mutex<Vec<Captured>>>;

async fn query(
    State(captures): State<Captures>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    captures.lock().unwrap().push(Captured {
        version: params.get("v").cloned(),
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        body: body.clone(),
    });

    match body["query"].as_str() {
        Some("explode") => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "boom"})),
        ),
        Some("unauthorized") => (
            StatusCode::OK,
            Json(json!({
                "status": {"code": 401, "errorType": "unauthorized", "errorDetails": "bad token"}
            })),
        ),
        Some(text) => (
            StatusCode::OK,
            Json(json!({
                "id": "resp-1",
                "lang": body["lang"],
                "result": {
                    "source": "agent",
                    "resolvedQuery": text,
                    "action": "input.welcome",
                    "parameters": {},
                    "fulfillment": {"speech": "Hi there!"},
                    "score": 0.9
                },
                "status": {"code": 200, "errorType": "success"},
                "sessionId": body["sessionId"]
            })),
        ),
        None => (StatusCode::BAD_REQUEST, Json(json!({}))),
    }
}

/// Start the stand-in server, return (base_url, captures).
async fn start_server() -> (String, Captures) {
    let captures: Captures = Arc::default();
    let app = Router::new()
        .route("/v1/query", post(query))
        .with_state(Arc::clone(&captures));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://127.0.0.1:{port}/v1"), captures)
}

fn client(base_url: &str) -> ApiAiClient {
    let mut config = NluConfig::new("client-token");
    config.base_url = base_url.to_string();
    ApiAiClient::new(config).unwrap()
}

fn request(text: &str) -> TextRequest {
    TextRequest::new(
        text,
        "session-42",
        OriginalRequest {
            source: "intent-bridge".into(),
            data: json!({"user": "U1", "text": text}),
        },
    )
}

#[tokio::test]
async fn sends_query_with_auth_and_parses_response() {
    let (base_url, captures) = start_server().await;

    let response = client(&base_url)
        .text_request(&request("hello"))
        .await
        .unwrap();

    assert_eq!(response.action(), Some("input.welcome"));
    assert_eq!(response.speech(), Some("Hi there!"));
    assert_eq!(response.session_id.as_deref(), Some("session-42"));
    assert_eq!(response.lang.as_deref(), Some("en"));

    let captured = captures.lock().unwrap();
    assert_eq!(captured.len(), 1);
    let sent = &captured[0];
    assert_eq!(sent.version.as_deref(), Some("20150910"));
    assert_eq!(sent.authorization.as_deref(), Some("Bearer client-token"));
    assert_eq!(sent.body["query"], "hello");
    assert_eq!(sent.body["sessionId"], "session-42");
    assert_eq!(sent.body["originalRequest"]["source"], "intent-bridge");
    assert_eq!(sent.body["originalRequest"]["data"]["user"], "U1");
}

#[tokio::test]
async fn http_error_is_reported() {
    let (base_url, _captures) = start_server().await;

    let err = client(&base_url)
        .text_request(&request("explode"))
        .await
        .unwrap_err();

    match err {
        NluError::HttpStatus { status, body, .. } => {
            assert_eq!(status, 500);
            assert!(body.contains("boom"));
        }
        other => panic!("expected HttpStatus, got {other}"),
    }
}

#[tokio::test]
async fn backend_status_error_is_reported() {
    let (base_url, _captures) = start_server().await;

    let err = client(&base_url)
        .text_request(&request("unauthorized"))
        .await
        .unwrap_err();

    match err {
        NluError::Status {
            code,
            error_type,
            details,
            ..
        } => {
            assert_eq!(code, 401);
            assert_eq!(error_type, "unauthorized");
            assert_eq!(details, "bad token");
        }
        other => panic!("expected Status, got {other}"),
    }
}

#[tokio::test]
async fn missing_endpoint_is_http_error() {
    let (base_url, _captures) = start_server().await;

    let err = client(&format!("{base_url}/nope"))
        .text_request(&request("hello"))
        .await
        .unwrap_err();

    assert!(matches!(err, NluError::HttpStatus { status: 404, .. }), "got {err}");
}
