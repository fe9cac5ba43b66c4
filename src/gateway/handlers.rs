//! HTTP Handlers

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use std::sync::Arc;

use crate::coordinator::TransferRequest;
use crate::error::EngineError;
use crate::ledger::TransferId;
use crate::webhook::{WebhookAck, WebhookIngestor};

use super::state::AppState;
use super::types::{
    ApiResponse, CreateTransferRequest, TransferResponse, error_code_for, error_codes,
};

/// Hex HMAC of the raw body, set by both processors
const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

type ApiError = (StatusCode, Json<ApiResponse<()>>);

fn engine_error(err: EngineError) -> ApiError {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(ApiResponse::<()>::error(error_code_for(&err), err.to_string())),
    )
}

/// POST /api/v1/transfers
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTransferRequest>,
) -> Result<Json<ApiResponse<TransferResponse>>, ApiError> {
    let record = state
        .coordinator
        .initiate(TransferRequest {
            user_id: req.user_id,
            amount: req.amount,
            currency: req.currency,
            recipient: req.recipient,
            payment_ref: req.payment_ref,
        })
        .await
        .map_err(engine_error)?;

    Ok(Json(ApiResponse::success(TransferResponse::from(&record))))
}

/// GET /api/v1/transfers/{id}
pub async fn get_transfer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<TransferResponse>>, ApiError> {
    let transfer_id: TransferId = id.parse().map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::error(
                error_codes::INVALID_PARAMETER,
                "Invalid transfer id format",
            )),
        )
    })?;

    let record = state
        .store
        .get(transfer_id)
        .await
        .map_err(engine_error)?
        .ok_or_else(|| engine_error(EngineError::TransferNotFound(id)))?;

    Ok(Json(ApiResponse::success(TransferResponse::from(&record))))
}

/// POST /webhooks/payout
pub async fn payout_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<&'static str>>, ApiError> {
    ingest(&state.payout_ingestor, &headers, &body).await
}

/// POST /webhooks/payment
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<&'static str>>, ApiError> {
    ingest(&state.payment_ingestor, &headers, &body).await
}

/// GET /health
pub async fn health() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("ok"))
}

/// Shared webhook path: signature header required, raw bytes handed to
/// the ingestor untouched. Every ack variant is a 200 so processors
/// never retry-storm.
async fn ingest(
    ingestor: &WebhookIngestor,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Json<ApiResponse<&'static str>>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| engine_error(EngineError::InvalidSignature))?;

    let ack = ingestor
        .handle(body, signature)
        .await
        .map_err(engine_error)?;

    let label = match ack {
        WebhookAck::Applied => "applied",
        WebhookAck::NoOp => "no-op",
        WebhookAck::Ignored => "ignored",
    };
    Ok(Json(ApiResponse::success(label)))
}
