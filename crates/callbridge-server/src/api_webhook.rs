//! Telephony webhook handlers.
//!
//! Call-start and resume answer with TwiML. The transcript webhook always
//! answers `204 No Content` right away; any turn it triggers runs on the
//! worker queue after the response has been sent.

use crate::middleware::{parse_form, request_host};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::Extension,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use callbridge_core::event;
use std::sync::Arc;

fn twiml_response(xml: String) -> Response {
    ([(header::CONTENT_TYPE, "text/xml; charset=utf-8")], xml).into_response()
}

/// Handler for `POST /twilio/voice`.
pub async fn call_start_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let form = parse_form(&body);
    let call_id = event::call_id(&form);
    let host = request_host(state.webhooks.public_host.as_deref(), &headers);

    let xml = state.orchestrator.call_start(&call_id, &host).await;
    twiml_response(xml)
}

/// Handler for `POST /twilio/resume`.
pub async fn resume_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let form = parse_form(&body);
    let call_id = event::call_id(&form);
    let host = request_host(state.webhooks.public_host.as_deref(), &headers);

    twiml_response(state.orchestrator.resume(&call_id, &host))
}

/// Handler for `POST /twilio/transcription`.
pub async fn transcription_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let form = parse_form(&body);
    let transcript = event::classify(&form);
    let host = request_host(state.webhooks.public_host.as_deref(), &headers);

    let disposition = state.orchestrator.transcript(&transcript, &host);
    tracing::debug!(call_sid = %transcript.call_id, ?disposition, "transcript webhook handled");

    StatusCode::NO_CONTENT
}
