#![cfg(test)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use axum::{
    Form, Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use relay_bot::{
    base::config::{Config, ConfigInner},
    service::llm::LlmClient,
};
use serde_json::json;

/// One request the fake API received.
#[derive(Debug, Clone)]
struct Received {
    api_key: Option<String>,
    form: HashMap<String, String>,
}

type Inbox = Arc<Mutex<Vec<Received>>>;

/// Mimics the text generator; prompts steer the failure modes.
async fn text_generator(State(inbox): State<Inbox>, headers: HeaderMap, Form(form): Form<HashMap<String, String>>) -> Response {
    let text = form.get("text").cloned().unwrap_or_default();

    inbox.lock().unwrap().push(Received {
        api_key: headers.get("api-key").and_then(|v| v.to_str().ok()).map(str::to_string),
        form,
    });

    match text.as_str() {
        "quota" => Json(json!({ "err": "Out of credits" })).into_response(),
        "crash" => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        "silent" => Json(json!({ "id": "abc" })).into_response(),
        _ => Json(json!({ "id": "abc", "output": format!("A caption about {text}.") })).into_response(),
    }
}

async fn start_fake_deepai() -> (String, Inbox) {
    let inbox = Inbox::default();
    let app = Router::new().route("/api/text-generator", post(text_generator)).with_state(inbox.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/api/text-generator"), inbox)
}

fn deepai_client(endpoint: String) -> LlmClient {
    let config = Config::from(ConfigInner {
        deepai_api_key: "quickstart-key".to_string(),
        deepai_endpoint: endpoint,
        ..Default::default()
    });

    LlmClient::from_config(&config)
}

#[tokio::test]
async fn test_deepai_posts_prompt_with_api_key() {
    let (endpoint, inbox) = start_fake_deepai().await;
    let llm = deepai_client(endpoint);

    let output = llm.generate("my dog at the beach").await.unwrap();

    assert_eq!(output, "A caption about my dog at the beach.");

    let inbox = inbox.lock().unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].api_key.as_deref(), Some("quickstart-key"));
    assert_eq!(inbox[0].form["text"], "my dog at the beach");
}

#[tokio::test]
async fn test_deepai_error_field_is_an_error() {
    let (endpoint, _inbox) = start_fake_deepai().await;
    let llm = deepai_client(endpoint);

    let error = llm.generate("quota").await.unwrap_err();

    assert!(error.to_string().contains("Out of credits"), "{error}");
}

#[tokio::test]
async fn test_deepai_server_error_is_an_error() {
    let (endpoint, _inbox) = start_fake_deepai().await;
    let llm = deepai_client(endpoint);

    assert!(llm.generate("crash").await.is_err());
}

#[tokio::test]
async fn test_deepai_missing_output_is_empty() {
    let (endpoint, _inbox) = start_fake_deepai().await;
    let llm = deepai_client(endpoint);

    assert_eq!(llm.generate("silent").await.unwrap(), "");
}
