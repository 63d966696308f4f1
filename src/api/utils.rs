//! Stateless request helpers shared by the handlers

use axum::body::Body;
use axum::http::HeaderMap;
use http_body_util::{BodyExt, LengthLimitError, Limited};

use crate::api::error::ApiError;
use crate::queue::JobId;

/// Check the request's Content-Type is JSON.
///
/// Accepts `application/json` with or without parameters. Rejects look-alikes
/// such as `application/jsonp`, `application/json-patch+json`, `text/json`.
pub fn require_json(headers: &HeaderMap) -> Result<mime::Mime, ApiError> {
    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::InvalidPayload("missing Content-Type header".into()))?;

    parse_content_type(content_type)
}

pub fn parse_content_type(content_type: &str) -> Result<mime::Mime, ApiError> {
    let media_type: mime::Mime = content_type
        .parse()
        .map_err(|_| ApiError::InvalidPayload(format!("invalid Content-Type: {}", content_type)))?;

    if media_type.type_() != mime::APPLICATION || media_type.subtype() != mime::JSON {
        return Err(ApiError::InvalidPayload(format!(
            "Content-Type must be application/json, got: {}/{}",
            media_type.type_(),
            media_type.subtype()
        )));
    }

    Ok(media_type)
}

/// Read the whole (already decompressed) body, refusing more than `max_size` bytes
pub async fn read_body(body: Body, max_size: usize) -> Result<Vec<u8>, ApiError> {
    let collected = Limited::new(body, max_size).collect().await.map_err(|err| {
        if err.downcast_ref::<LengthLimitError>().is_some() {
            ApiError::PayloadTooLarge(max_size)
        } else {
            ApiError::InvalidPayload(format!("failed to read body: {err}"))
        }
    })?;

    Ok(collected.to_bytes().to_vec())
}

/// Parse the `{task_id}` path segment
pub fn parse_task_id(raw: &str) -> Result<JobId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::InvalidTaskId(raw.to_string()))
}
