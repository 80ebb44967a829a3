use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::post,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use serde_json::{Value, json};

use guardian_classifier::{ClarifaiClient, ClarifaiConfig, Classifier, ClassifierError};
use guardian_types::models::LabelScore;

#[derive(Clone, Default)]
struct Seen {
    requests: Arc<Mutex<Vec<(String, Value)>>>,
}

/// Serve `router` on an ephemeral port and return the API base URL.
async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}/v2", addr)
}

fn client_for(base_url: String, timeout: Duration) -> ClarifaiClient {
    let mut config = ClarifaiConfig::new("test-key");
    config.base_url = base_url;
    config.timeout = timeout;
    ClarifaiClient::new(config).unwrap()
}

async fn record_and_answer(
    State(seen): State<Seen>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    seen.requests.lock().unwrap().push((auth, body));

    Json(json!({
        "status": {"code": 10000, "description": "Ok"},
        "results": [{
            "outputs": [
                {"data": {"concepts": [
                    {"name": "safe", "value": 0.97},
                    {"name": "suggestive", "value": 0.02}
                ]}},
                {"data": {"concepts": [{"name": "weapons", "value": 0.91}]}}
            ]
        }]
    }))
}

#[tokio::test]
async fn sends_base64_image_with_key_header() {
    let seen = Seen::default();
    let router = Router::new()
        .route("/v2/workflows/{workflow}/results", post(record_and_answer))
        .with_state(seen.clone());
    let client = client_for(spawn(router).await, Duration::from_secs(5));

    let image = b"\x89PNG\r\n\x1a\nnot really a png";
    let concepts = client.classify(image).await.unwrap();

    assert_eq!(
        concepts,
        vec![
            LabelScore::new("safe", 0.97),
            LabelScore::new("suggestive", 0.02),
            LabelScore::new("weapons", 0.91),
        ]
    );

    let requests = seen.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let (auth, body) = &requests[0];
    assert_eq!(auth, "Key test-key");
    assert_eq!(body["user_app_id"]["user_id"], "clarifai");
    assert_eq!(body["user_app_id"]["app_id"], "main");

    let encoded = body["inputs"][0]["data"]["image"]["base64"].as_str().unwrap();
    assert_eq!(B64.decode(encoded).unwrap(), image);
}

#[tokio::test]
async fn error_status_carries_response_body() {
    let router = Router::new().route(
        "/v2/workflows/{workflow}/results",
        post(|| async {
            (
                StatusCode::UNAUTHORIZED,
                r#"{"status":{"code":11009,"description":"API key not found"}}"#,
            )
                .into_response()
        }),
    );
    let client = client_for(spawn(router).await, Duration::from_secs(5));

    let err = client.classify(b"img").await.unwrap_err();
    match &err {
        ClassifierError::Status { status, body } => {
            assert_eq!(*status, 401);
            assert!(body.contains("API key not found"));
        }
        other => panic!("expected status error, got {:?}", other),
    }
    assert!(err.diagnostic().contains("API key not found"));
}

#[tokio::test]
async fn unparseable_success_body_is_malformed() {
    let router = Router::new().route(
        "/v2/workflows/{workflow}/results",
        post(|| async { "definitely not json" }),
    );
    let client = client_for(spawn(router).await, Duration::from_secs(5));

    let err = client.classify(b"img").await.unwrap_err();
    assert!(matches!(err, ClassifierError::Malformed { .. }));
    assert_eq!(err.diagnostic(), "definitely not json");
}

#[tokio::test]
async fn slow_classifier_times_out() {
    let router = Router::new().route(
        "/v2/workflows/{workflow}/results",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({"results": []}))
        }),
    );
    let client = client_for(spawn(router).await, Duration::from_millis(200));

    let err = client.classify(b"img").await.unwrap_err();
    assert!(matches!(err, ClassifierError::Timeout), "got {:?}", err);
}

#[tokio::test]
async fn unreachable_classifier_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(format!("http://{}/v2", addr), Duration::from_secs(5));
    let err = client.classify(b"img").await.unwrap_err();
    assert!(matches!(err, ClassifierError::Transport(_)), "got {:?}", err);
}
