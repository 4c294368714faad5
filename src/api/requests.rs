// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request intake and payment endpoints.

use axum::{
    extract::{Path, State},
    http::{header::CONTENT_TYPE, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

use crate::error::ApiError;
use crate::inbox::{PaymentConfirmation, ScanResult};
use crate::models::{
    ConfirmPaymentBody, CreateRequestBody, CreateRequestResponse, PaymentConfirmedResponse,
    PaymentRequiredResponse, RequestSnapshot, ScanMissResponse,
};
use crate::payment::SOLANA_MAINNET;
use crate::state::AppState;
use crate::storage::RequestStatus;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";
/// Set on responses replayed from an earlier call with the same key.
pub const IDEMPOTENT_REPLAY_HEADER: &str = "idempotent-replayed";

pub(super) fn parse_request_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(format!("Invalid request id: {raw}")))
}

fn confirmed(c: PaymentConfirmation) -> PaymentConfirmedResponse {
    PaymentConfirmedResponse {
        ok: true,
        request: RequestSnapshot::from(&c.request),
        tx_sig: c.tx_sig,
        newly_paid: c.newly_paid,
        verification: c.verification,
    }
}

/// Submit a request for triage and quoting.
///
/// Accepted requests come back with a payment intent. Repeating the call with
/// the same `Idempotency-Key` returns the first response byte for byte.
#[utoipa::path(
    post,
    path = "/v1/requests",
    tag = "Requests",
    request_body = CreateRequestBody,
    params(
        ("Idempotency-Key" = Option<String>, Header, description = "Makes creation safe to retry")
    ),
    responses(
        (status = 201, description = "Request recorded (rejected or awaiting payment)", body = CreateRequestResponse),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn create_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateRequestBody>,
) -> Result<Response, ApiError> {
    let key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .map(|v| {
            v.to_str()
                .map_err(|_| ApiError::bad_request("Idempotency-Key must be visible ASCII"))
        })
        .transpose()?;

    let outcome = state.ledger.create_request(key, body)?;

    let mut response = (
        StatusCode::CREATED,
        [(CONTENT_TYPE, "application/json")],
        outcome.body,
    )
        .into_response();
    if outcome.replayed {
        response
            .headers_mut()
            .insert(IDEMPOTENT_REPLAY_HEADER, HeaderValue::from_static("true"));
    }
    Ok(response)
}

/// Fetch a request.
///
/// While the request awaits payment this answers 402 with an x402-style
/// payment payload; otherwise the request snapshot.
#[utoipa::path(
    get,
    path = "/v1/requests/{id}",
    tag = "Requests",
    params(("id" = String, Path, description = "Request id (UUID)")),
    responses(
        (status = 200, description = "Request snapshot", body = RequestSnapshot),
        (status = 402, description = "Payment required", body = PaymentRequiredResponse),
        (status = 404, description = "Unknown request")
    )
)]
pub async fn get_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_request_id(&id)?;
    let request = state.ledger.get_request(&id)?;

    if request.status == RequestStatus::AwaitingPayment {
        let payment = state.ledger.payment_intent(&request)?;
        let payload = PaymentRequiredResponse::new(id, SOLANA_MAINNET.network_id, payment);
        return Ok((StatusCode::PAYMENT_REQUIRED, Json(payload)).into_response());
    }

    Ok(Json(RequestSnapshot::from(&request)).into_response())
}

/// Confirm payment with a transaction signature.
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/confirm",
    tag = "Payments",
    params(("id" = String, Path, description = "Request id (UUID)")),
    request_body = ConfirmPaymentBody,
    responses(
        (status = 200, description = "Request is paid", body = PaymentConfirmedResponse),
        (status = 400, description = "Malformed signature"),
        (status = 402, description = "Transaction does not pay this request"),
        (status = 404, description = "Unknown request"),
        (status = 409, description = "Request not payable or signature already used"),
        (status = 503, description = "Ledger unavailable")
    )
)]
pub async fn confirm_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ConfirmPaymentBody>,
) -> Result<Json<PaymentConfirmedResponse>, ApiError> {
    let id = parse_request_id(&id)?;
    let confirmation = state.ledger.confirm_payment(&id, &body.tx_sig).await?;
    Ok(Json(confirmed(confirmation)))
}

/// Look for the payment among the recipient's recent transactions.
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/scan",
    tag = "Payments",
    params(("id" = String, Path, description = "Request id (UUID)")),
    responses(
        (status = 200, description = "Paid, or `ok: false` when nothing matched yet", body = PaymentConfirmedResponse),
        (status = 404, description = "Unknown request"),
        (status = 409, description = "Request not payable"),
        (status = 503, description = "Ledger unavailable")
    )
)]
pub async fn scan_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_request_id(&id)?;

    match state.ledger.scan_for_payment(&id).await? {
        ScanResult::Paid(confirmation) => Ok(Json(confirmed(confirmation)).into_response()),
        ScanResult::NotFound(outcome) => Ok(Json(ScanMissResponse {
            ok: false,
            reason: outcome
                .reason
                .unwrap_or(crate::payment::ScanMissReason::NotFoundInRecent),
            checked: outcome.checked,
        })
        .into_response()),
    }
}
