//! Serving of stored greeting and reply audio.
//!
//! Names are validated against the audio store first; the file itself is
//! served by `ServeFile`, which handles single byte ranges, `416` and `HEAD`.

use crate::{api::ApiError, AppState};
use axum::{
    body::Body,
    extract::{Extension, Path, Request},
    http::{header, HeaderValue},
    response::Response,
};
use callbridge_core::StoreError;
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::services::ServeFile;

/// Handler for `GET`/`HEAD /audio/{file}`.
pub async fn get_audio_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(file): Path<String>,
    req: Request,
) -> Result<Response, ApiError> {
    let path = state.audio_store.resolve(&file)?;

    match tokio::fs::metadata(&path).await {
        Ok(m) if m.is_file() => {}
        Ok(_) => return Err(StoreError::NotFound(file).into()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StoreError::NotFound(file).into())
        }
        Err(e) => return Err(StoreError::Io(e).into()),
    }

    let response = match ServeFile::new(&path).oneshot(req).await {
        Ok(response) => response,
        Err(never) => match never {},
    };

    let mut response = response.map(Body::new);
    if response.status().is_success() {
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("audio/wav"));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    } else {
        tracing::debug!(file = %file, status = %response.status(), "audio request not served");
    }

    Ok(response)
}
