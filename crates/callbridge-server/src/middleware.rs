use axum::{
    body::{Body, Bytes},
    extract::FromRequest,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use callbridge_core::signature::{self, SIGNATURE_HEADER};
use std::sync::Arc;

use crate::AppState;

/// Largest webhook body accepted (64 KiB), applied to the webhook routes
/// with `DefaultBodyLimit`.
pub const MAX_WEBHOOK_BODY_BYTES: usize = 64 * 1024;

/// Decodes an `application/x-www-form-urlencoded` body into ordered pairs.
pub fn parse_form(body: &[u8]) -> Vec<(String, String)> {
    url::form_urlencoded::parse(body).into_owned().collect()
}

/// Public host for building absolute URLs: the configured host if any,
/// otherwise the request's `Host` header.
pub fn request_host(public_host: Option<&str>, headers: &HeaderMap) -> String {
    if let Some(host) = public_host.filter(|h| !h.is_empty()) {
        return host.to_string();
    }
    headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or("localhost")
        .to_string()
}

/// Middleware rejecting webhooks whose provider signature does not verify.
///
/// The signed URL is the public `https` URL of the request. The body is
/// buffered for verification and handed on unchanged. A body over the limit
/// is answered with `413`, any other body read failure with `400`.
pub async fn signature_middleware(req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let state = req
        .extensions()
        .get::<Arc<AppState>>()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?
        .clone();

    if !state.webhooks.verify_signatures {
        return Ok(next.run(req).await);
    }

    let (parts, body) = req.into_parts();
    // The body limit travels in the request extensions.
    let mut body_req = Request::new(body);
    *body_req.extensions_mut() = parts.extensions.clone();
    let bytes = Bytes::from_request(body_req, &()).await.map_err(|rejection| {
        tracing::warn!(status = %rejection.status(), "failed to read webhook body: {}", rejection);
        rejection.status()
    })?;

    let form = parse_form(&bytes);
    let host = request_host(state.webhooks.public_host.as_deref(), &parts.headers);
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let full_url = format!("https://{}{}", host, path_and_query);
    let provided = parts
        .headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    if !signature::verify(
        true,
        Some(&state.webhooks.auth_token),
        Some(&full_url),
        provided,
        &form,
    ) {
        tracing::warn!(url = %full_url, has_signature = provided.is_some(), "rejecting webhook with invalid signature");
        return Err(StatusCode::FORBIDDEN);
    }

    let req = Request::from_parts(parts, Body::from(bytes));
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn parse_form_decodes_pairs_in_order() {
        let form = parse_form(b"CallSid=CA1&SpeechResult=hello+there%21&Empty=");
        assert_eq!(
            form,
            vec![
                ("CallSid".to_string(), "CA1".to_string()),
                ("SpeechResult".to_string(), "hello there!".to_string()),
                ("Empty".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn configured_host_wins_over_header() {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("internal:3000"));
        assert_eq!(request_host(Some("bridge.example.com"), &headers), "bridge.example.com");
        assert_eq!(request_host(None, &headers), "internal:3000");
        assert_eq!(request_host(Some(""), &HeaderMap::new()), "localhost");
    }
}
