//! HTTP surface of the bot.
//!
//! - `POST /whatsapp`: Twilio inbound message webhook (form-encoded). Answers at once
//!   with empty TwiML and processes the message in the background.
//! - `POST /send_whatsapp_message`: manual send, `{ "to": ..., "message": ... }`.
//! - `GET /health`: liveness probe.

use axum::{
    Form, Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::{
    base::types::{MessageId, Recipient, Void},
    interaction::{
        inbound::{InboundEvent, handle_inbound},
        manual_send,
    },
    runtime::Runtime,
};

/// Empty TwiML document; replies go out through the REST API instead.
pub const EMPTY_TWIML: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Response></Response>"#;

/// The Twilio webhook fields we read (the rest are ignored).
#[derive(Debug, Deserialize)]
pub struct InboundForm {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "Body", default)]
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct ManualSendRequest {
    pub to: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ManualSendResponse {
    Sent {
        sids: Vec<MessageId>,
    },
    Failed {
        #[serde(skip_serializing_if = "Option::is_none")]
        part: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        total: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        message: String,
        sids: Vec<MessageId>,
    },
}

/// Build the axum router with all routes.
pub fn build_router(runtime: Runtime) -> Router {
    Router::new()
        .route("/whatsapp", post(whatsapp_webhook))
        .route("/send_whatsapp_message", post(send_whatsapp_message))
        .route("/health", get(health))
        .with_state(runtime)
}

/// Bind the configured address and serve until Ctrl-C.
pub async fn serve(runtime: Runtime) -> Void {
    let addr = runtime.config.listen_addr.clone();
    let app = build_router(runtime);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Webhook server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}

#[instrument(skip_all)]
async fn whatsapp_webhook(State(runtime): State<Runtime>, Form(form): Form<InboundForm>) -> Response {
    match InboundEvent::classify(&form.from, &form.body, &runtime.config) {
        Ok(event) => {
            info!(recipient = %event.recipient(), "Received inbound message ...");
            handle_inbound(event, runtime.config.clone(), runtime.llm.clone(), runtime.sessions.clone());
        }
        Err(err) => warn!("Ignoring inbound message: {err}"),
    }

    ([(header::CONTENT_TYPE, "text/xml")], EMPTY_TWIML).into_response()
}

#[instrument(skip_all)]
async fn send_whatsapp_message(State(runtime): State<Runtime>, Json(request): Json<ManualSendRequest>) -> Response {
    let recipient = match Recipient::parse(&request.to) {
        Ok(recipient) => recipient,
        Err(err) => {
            let body = ManualSendResponse::Failed {
                part: None,
                total: None,
                kind: None,
                code: None,
                message: err.to_string(),
                sids: Vec::new(),
            };

            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }
    };

    match manual_send::send_all(&runtime.sessions, &recipient, &request.message).await {
        Ok(sids) => (StatusCode::OK, Json(ManualSendResponse::Sent { sids })).into_response(),
        Err(failed) => {
            let body = ManualSendResponse::Failed {
                part: Some(failed.failure.index),
                total: Some(failed.failure.total),
                kind: Some(failed.failure.error.kind.to_string()),
                code: Some(failed.failure.error.code),
                message: failed.failure.error.message,
                sids: failed.delivered,
            };

            (StatusCode::BAD_GATEWAY, Json(body)).into_response()
        }
    }
}

async fn health() -> &'static str {
    "ok"
}
