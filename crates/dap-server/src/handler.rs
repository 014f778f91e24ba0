use std::sync::Arc;

use axum::extract::rejection::BytesRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use dap_commitments::{
    decode, decode_hex, detect_bridge_mode, encode, CommitmentMeta, CommitmentMode, DecodeError,
};
use dap_store::{Manager, PrecomputedKeyStore, Store, StoreError};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::error::{ServerError, ServerResult};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<Manager>,
}

impl AppState {
    pub fn new(manager: Arc<Manager>) -> Self {
        Self { manager }
    }
}

/// `?commitment_mode=` query parameter.
#[derive(Debug, Default, Deserialize)]
pub struct ModeQuery {
    pub commitment_mode: Option<String>,
}

impl ModeQuery {
    fn mode(&self) -> Result<Option<CommitmentMode>, DecodeError> {
        self.commitment_mode.as_deref().map(str::parse).transpose()
    }
}

fn octet_stream(body: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "application/octet-stream")], body).into_response()
}

/// Unwrap a buffered request body. A body cut off at the router's length
/// limit is an oversized blob, reported against `meta` like any other.
fn blob_body(
    state: &AppState,
    meta: CommitmentMeta,
    headers: &HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ServerResult<Bytes> {
    match body {
        Ok(body) => Ok(body),
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            let max = state.manager.config().max_blob_size;
            let size = headers
                .get(header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(max.saturating_add(1));
            Err(ServerError::request(meta, StoreError::OversizedBlob { size, max }))
        }
        Err(rejection) => Err(ServerError::Body(rejection)),
    }
}

/// Health check handler.
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Info handler.
pub async fn info_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let manager = &state.manager;
    let router = manager.router();
    let names = |targets: &[Arc<dyn PrecomputedKeyStore>]| {
        targets
            .iter()
            .map(|t| t.backend_type().to_string())
            .collect::<Vec<_>>()
    };
    Json(json!({
        "name": "dap-server",
        "version": env!("CARGO_PKG_VERSION"),
        "modes": CommitmentMode::ALL.iter().map(|m| m.as_str()).collect::<Vec<_>>(),
        "max_blob_size": manager.config().max_blob_size,
        "cache_targets": names(router.caches()),
        "fallback_targets": names(router.fallbacks()),
        "async_put_workers": router.config().async_put_workers,
        "metrics": manager.metrics().snapshot(),
    }))
}

/// `GET /get/{commitment}`: serve a verified blob.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    Query(query): Query<ModeQuery>,
) -> ServerResult<Response> {
    let encoded = decode_hex(&raw)?;
    let mode = match query.mode()? {
        Some(mode) => mode,
        None => detect_bridge_mode(&encoded)?,
    };
    let (commitment, version) = decode(&encoded, mode)?;
    let meta = CommitmentMeta::new(mode, version);
    info!(%meta, commitment = %hex::encode(&commitment), "processing get");

    let blob = state
        .manager
        .get(mode, &commitment)
        .await
        .map_err(|e| ServerError::request(meta, e))?;
    Ok(octet_stream(blob))
}

/// `POST /put`: store a blob under a backend-assigned commitment.
/// Defaults to the bridge-generic encoding.
pub async fn put_handler(
    State(state): State<AppState>,
    Query(query): Query<ModeQuery>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ServerResult<Response> {
    let mode = query.mode()?.unwrap_or(CommitmentMode::BridgeGeneric);
    let meta = CommitmentMeta::for_put(mode);
    let body = blob_body(&state, meta, &headers, body)?;
    info!(%meta, size = body.len(), "processing put");

    let commitment = state
        .manager
        .put(mode, None, &body)
        .await
        .map_err(|e| ServerError::request(meta, e))?;
    if mode == CommitmentMode::BridgeKeccak {
        return Ok(().into_response());
    }
    Ok(octet_stream(encode(&commitment, mode)))
}

/// `POST /put/{commitment}`: store a blob under a caller-chosen keccak
/// commitment. The response body is empty; the caller already holds the key.
pub async fn put_keyed_handler(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ServerResult<Response> {
    let mode = CommitmentMode::BridgeKeccak;
    let (key, version) = decode(&decode_hex(&raw)?, mode)?;
    let meta = CommitmentMeta::new(mode, version);
    let body = blob_body(&state, meta, &headers, body)?;
    info!(%meta, key = %hex::encode(&key), size = body.len(), "processing put");

    state
        .manager
        .put(mode, Some(&key), &body)
        .await
        .map_err(|e| ServerError::request(meta, e))?;
    Ok(().into_response())
}
