#![cfg(test)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use axum::{
    Form, Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use chrono::{TimeDelta, Utc};
use relay_bot::{
    base::{
        config::{Config, ConfigInner},
        types::{MessageId, Recipient},
    },
    service::transport::{TransportClient, TransportErrorKind},
};
use serde_json::json;

/// One request the fake API received.
#[derive(Debug, Clone)]
struct Received {
    account: String,
    authorization: Option<String>,
    form: HashMap<String, String>,
}

type Inbox = Arc<Mutex<Vec<Received>>>;

/// Mimics the Messages endpoint; bodies containing `FAIL` get a rate-limit error.
async fn create_message(State(inbox): State<Inbox>, Path(account): Path<String>, headers: HeaderMap, Form(form): Form<HashMap<String, String>>) -> Response {
    let body = form.get("Body").cloned().unwrap_or_default();

    let sid = {
        let mut inbox = inbox.lock().unwrap();
        inbox.push(Received {
            account,
            authorization: headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()).map(str::to_string),
            form,
        });
        format!("SM{:032}", inbox.len())
    };

    if body.contains("FAIL") {
        let error = json!({ "code": 20429, "message": "Too Many Requests", "status": 429 });
        return (StatusCode::TOO_MANY_REQUESTS, Json(error)).into_response();
    }

    if body.contains("GARBLED") {
        return (StatusCode::BAD_REQUEST, "not json").into_response();
    }

    (StatusCode::CREATED, Json(json!({ "sid": sid, "status": "queued" }))).into_response()
}

async fn start_fake_twilio() -> (String, Inbox) {
    let inbox = Inbox::default();
    let app = Router::new()
        .route("/2010-04-01/Accounts/{account}/Messages.json", post(create_message))
        .with_state(inbox.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), inbox)
}

fn twilio_config(api_base: String, messaging_service_sid: Option<&str>) -> Config {
    Config::from(ConfigInner {
        twilio_account_sid: "AC123".to_string(),
        twilio_auth_token: "secret".to_string(),
        twilio_from_number: "+15559990000".to_string(),
        twilio_messaging_service_sid: messaging_service_sid.map(str::to_string),
        twilio_api_base: api_base,
        ..Default::default()
    })
}

fn alice() -> Recipient {
    Recipient::parse("+15550000001").unwrap()
}

#[tokio::test]
async fn test_twilio_sends_prefixed_addresses_with_basic_auth() {
    let (base, inbox) = start_fake_twilio().await;
    let transport = TransportClient::twilio(&twilio_config(base, None)).unwrap();

    let id = transport.send(&alice(), "(1/2) hello", None).await.unwrap();

    assert_eq!(id, MessageId(format!("SM{:032}", 1)));

    let inbox = inbox.lock().unwrap();
    let received = &inbox[0];
    assert_eq!(received.account, "AC123");
    assert_eq!(received.authorization.as_deref(), Some("Basic QUMxMjM6c2VjcmV0"));
    assert_eq!(received.form["To"], "whatsapp:+15550000001");
    assert_eq!(received.form["From"], "whatsapp:+15559990000");
    assert_eq!(received.form["Body"], "(1/2) hello");
    assert!(!received.form.contains_key("SendAt"));
}

#[tokio::test]
async fn test_twilio_scheduled_send_uses_messaging_service() {
    let (base, inbox) = start_fake_twilio().await;
    let transport = TransportClient::twilio(&twilio_config(base, Some("MG456"))).unwrap();
    let send_at = Utc::now() + TimeDelta::minutes(20);

    transport.send(&alice(), "(2/2) later", Some(send_at)).await.unwrap();

    let inbox = inbox.lock().unwrap();
    let form = &inbox[0].form;
    assert_eq!(form["MessagingServiceSid"], "MG456");
    assert_eq!(form["ScheduleType"], "fixed");
    let sent_for = chrono::DateTime::parse_from_rfc3339(&form["SendAt"]).unwrap().with_timezone(&Utc);
    assert!(sent_for >= send_at);
    assert!(sent_for - send_at < TimeDelta::seconds(1));
    assert!(form["SendAt"].ends_with('Z'));
}

#[tokio::test]
async fn test_twilio_scheduled_send_without_service_is_rejected_locally() {
    let (base, inbox) = start_fake_twilio().await;
    let transport = TransportClient::twilio(&twilio_config(base, None)).unwrap();

    let error = transport.send(&alice(), "later", Some(Utc::now() + TimeDelta::minutes(20))).await.unwrap_err();

    assert_eq!(error.kind, TransportErrorKind::SchedulingRejected);
    assert!(inbox.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_twilio_error_body_is_classified() {
    let (base, _inbox) = start_fake_twilio().await;
    let transport = TransportClient::twilio(&twilio_config(base, None)).unwrap();

    let error = transport.send(&alice(), "FAIL please", None).await.unwrap_err();

    assert_eq!(error.kind, TransportErrorKind::RateLimited);
    assert_eq!(error.code, "20429");
    assert_eq!(error.message, "Too Many Requests");
}

#[tokio::test]
async fn test_twilio_unparseable_error_falls_back_to_status() {
    let (base, _inbox) = start_fake_twilio().await;
    let transport = TransportClient::twilio(&twilio_config(base, None)).unwrap();

    let error = transport.send(&alice(), "GARBLED", None).await.unwrap_err();

    assert_eq!(error.code, "400");
}

#[tokio::test]
async fn test_twilio_unreachable_is_a_network_error() {
    let transport = TransportClient::twilio(&twilio_config("http://127.0.0.1:9".to_string(), None)).unwrap();

    let error = transport.send(&alice(), "hello", None).await.unwrap_err();

    assert_eq!(error.kind, TransportErrorKind::Network);
}

#[test]
fn test_twilio_requires_credentials() {
    let config = Config::from(ConfigInner::default());

    assert!(TransportClient::twilio(&config).is_err());
}
