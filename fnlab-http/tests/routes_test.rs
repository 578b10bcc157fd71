use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use fnlab_core::{
    SecretConfig, SystemConfig, Workbench,
    config::{CannedResponse, TransformerKind},
    scratch::ScratchSpace,
};
use fnlab_http::{AppState, build_app};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

const ADD_REPLY: &str = r#"{"full_code": "def add(a, b):\n    return a + b", "function_name": "add", "inputs": [{"name": "a", "type": "number", "description": "First", "python_type": "int"}, {"name": "b", "type": "number", "description": "Second", "python_type": "int"}]}"#;

fn test_app() -> (Router, TempDir) {
    let mut config = SystemConfig::default();
    config.transformer.kind = TransformerKind::Canned;
    config.transformer.canned_responses = vec![CannedResponse {
        pattern: "Rewrite the function `add`".to_string(),
        reply: ADD_REPLY.to_string(),
    }];
    let scratch_root = tempfile::tempdir().unwrap();
    let state = AppState::with_workbench(
        Workbench::from_config(&config, &SecretConfig::default()),
        ScratchSpace::new(scratch_root.path()).unwrap(),
    );
    (build_app(state, 1024 * 1024), scratch_root)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("POST")
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_form(fields: &[(&str, &str)]) -> Request<Body> {
    let body = fields
        .iter()
        .map(|(name, value)| format!("{}={}", encode(name), encode(value)))
        .collect::<Vec<_>>()
        .join("&");
    Request::builder()
        .uri("/test")
        .method("POST")
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

fn encode(text: &str) -> String {
    text.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' => (b as char).to_string(),
            b => format!("%{b:02X}"),
        })
        .collect()
}

#[tokio::test]
async fn test_health_and_openapi() {
    let (app, _scratch) = test_app();
    let response = app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, doc) = send(
        &app,
        Request::get("/api-docs/openapi.json").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/analyze"].is_object());
}

#[tokio::test]
async fn test_code_analyze_test_flow() {
    let (app, _scratch) = test_app();

    let (status, body) = send(
        &app,
        post_json("/code", json!({"code": "def add(a, b): return a + b"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["functionNames"], json!(["add"]));
    let uid = body["uid"].as_str().unwrap().to_string();

    let (status, analyzed) = send(
        &app,
        post_json("/analyze", json!({"uid": uid, "functionName": "add"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(analyzed["entry_point"], json!("add"));
    assert_eq!(analyzed["fallback"], json!(false));
    assert_eq!(
        analyzed["inputs"][0],
        json!({"name": "a", "type": "number", "description": "First", "python_type": "int"})
    );

    let metadata = analyzed["inputs"].to_string();
    let (status, body) = send(
        &app,
        post_form(&[
            ("full_code", analyzed["full_code"].as_str().unwrap()),
            ("inputs_metadata", &metadata),
            ("a", "2"),
            ("b", "3"),
        ]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"result": 5, "stdout": ""}));
}

#[tokio::test]
async fn test_code_syntax_error() {
    let (app, _scratch) = test_app();
    let (status, body) = send(&app, post_json("/code", json!({"code": "def broken(:"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("line 1"));
}

#[tokio::test]
async fn test_malformed_json_bodies() {
    let (app, _scratch) = test_app();
    let request = Request::builder()
        .uri("/code")
        .method("POST")
        .header("Content-Type", "application/json")
        .body(Body::from("{\"code\": "))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = send(&app, post_json("/analyze", json!({"uid": "x"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("functionName"));

    let request = Request::builder()
        .uri("/code")
        .method("POST")
        .body(Body::from("code=1"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_analyze_unknown_session_and_function() {
    let (app, _scratch) = test_app();
    let (status, body) = send(
        &app,
        post_json("/analyze", json!({"uid": "nope", "functionName": "add"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let (_, created) = send(&app, post_json("/code", json!({"code": "x = 1\n"}))).await;
    let (status, _) = send(
        &app,
        post_json("/analyze", json!({"uid": created["uid"], "functionName": "add"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_execution_errors() {
    let (app, _scratch) = test_app();
    let typed = r#"[{"name": "n", "type": "number", "python_type": "int"}]"#;
    let code = "def half(n):\n    return 10 // n\n";

    let (status, body) = send(
        &app,
        post_form(&[("full_code", code), ("inputs_metadata", typed), ("n", "abc")]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Invalid value for 'n': expected int, got 'abc'"));

    let (status, body) = send(&app, post_form(&[("full_code", code)])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Missing required parameter: n"));

    let (status, body) = send(&app, post_form(&[("full_code", code), ("n", "0")])).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body["error"],
        json!("ZeroDivisionError: integer division or modulo by zero")
    );

    let (status, _) = send(&app, post_form(&[("n", "1")])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        post_form(&[("full_code", code), ("inputs_metadata", "[{")]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid inputs_metadata"));
}

#[tokio::test]
async fn test_multipart_upload() {
    let (app, scratch) = test_app();
    let boundary = "fnlab-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"full_code\"\r\n\r\n\
def describe(photo, caption):\n    print(caption)\n    return photo.endswith('/cat.png')\r\n\
--{b}\r\nContent-Disposition: form-data; name=\"caption\"\r\n\r\nA cat\r\n\
--{b}\r\nContent-Disposition: form-data; name=\"photo\"; filename=\"../../cat.png\"\r\n\
Content-Type: image/png\r\n\r\nnot really a png\r\n\
--{b}--\r\n",
        b = boundary
    );
    let request = Request::builder()
        .uri("/test")
        .method("POST")
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"result": true, "stdout": "A cat\n"}));
    // リクエスト終了後にスクラッチディレクトリは空になる
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}
