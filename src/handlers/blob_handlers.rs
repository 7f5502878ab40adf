//! HTTP handlers for blob operations.
//! Streams blob bodies to avoid buffering in memory and delegates storage
//! concerns to `LocalBlobStore`.

use crate::{
    errors::AppError,
    models::blob::Blob,
    services::storage_service::{ListBlobsParams, ListBlobsResult},
    state::AppState,
};
use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use std::io;
use tokio_util::io::ReaderStream;

#[derive(Debug, Deserialize)]
pub struct ListBlobsQuery {
    pub prefix: Option<String>,
    #[serde(rename = "max-keys")]
    pub max_keys: Option<usize>,
    #[serde(rename = "continuation-token")]
    pub continuation_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListBlobsResponse {
    pub prefix: Option<String>,
    pub max_keys: usize,
    pub key_count: usize,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
    pub blobs: Vec<Blob>,
}

/// PUT `/blobs/{*key}`
pub async fn put_blob(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    let stream = body.into_data_stream().map_err(io::Error::other);

    let blob = state
        .store
        .put_blob_stream(&key, content_type, stream)
        .await?;

    let mut response = Json(&blob).into_response();
    if let Some(etag) = blob.etag.as_ref() {
        if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", etag)) {
            response.headers_mut().insert(header::ETAG, value);
        }
    }
    Ok(response)
}

/// GET `/blobs/{*key}` as a streaming response.
pub async fn get_blob(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let (meta, file) = state.store.get_blob_reader(&key).await?;
    let body = Body::from_stream(ReaderStream::new(file));

    let mut response = Response::new(body);
    set_blob_headers(response.headers_mut(), &meta);
    Ok(response)
}

/// HEAD `/blobs/{*key}`: same headers as GET, no body.
pub async fn head_blob(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let meta = state.store.get_blob_metadata(&key).await?;
    let mut response = Response::new(Body::empty());
    set_blob_headers(response.headers_mut(), &meta);
    Ok(response)
}

/// DELETE `/blobs/{*key}`: explicit delete, outside any sweep.
pub async fn delete_blob(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.store.remove_blob(&key).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(format!("blob `{}` not found", key)))
    }
}

/// GET `/blobs?prefix=&max-keys=&continuation-token=`
pub async fn list_blobs(
    State(state): State<AppState>,
    Query(q): Query<ListBlobsQuery>,
) -> Result<Json<ListBlobsResponse>, AppError> {
    let max_keys = q.max_keys.unwrap_or(1000).clamp(1, 1000);
    let params = ListBlobsParams {
        prefix: q.prefix.clone(),
        continuation_token: q
            .continuation_token
            .as_deref()
            .map(decode_continuation_token),
        max_keys,
    };

    let ListBlobsResult {
        blobs,
        is_truncated,
        next_continuation_token,
    } = state.store.list_blobs(params).await?;

    Ok(Json(ListBlobsResponse {
        prefix: q.prefix,
        max_keys,
        key_count: blobs.len(),
        is_truncated,
        next_continuation_token: next_continuation_token
            .as_deref()
            .map(encode_continuation_token),
        blobs,
    }))
}

fn set_blob_headers(headers: &mut HeaderMap, meta: &Blob) {
    let content_type = meta
        .content_type
        .as_deref()
        .unwrap_or("application/octet-stream");
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from(meta.size_bytes.max(0)),
    );

    if let Some(etag) = meta.etag.as_ref() {
        if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", etag)) {
            headers.insert(header::ETAG, value);
        }
    }

    if let Ok(value) = HeaderValue::from_str(&meta.last_modified.to_rfc2822()) {
        headers.insert(header::LAST_MODIFIED, value);
    }
}

fn encode_continuation_token(token: &str) -> String {
    general_purpose::STANDARD.encode(token)
}

fn decode_continuation_token(token: &str) -> String {
    general_purpose::STANDARD
        .decode(token)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| token.to_string())
}
