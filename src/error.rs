// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use tracing::error;

use crate::payment::{IntentError, LedgerError, VerificationReason, VerificationResult};
use crate::storage::{InboxDbError, InvalidTransition};

/// Domain errors raised by the request ledger.
#[derive(Debug, thiserror::Error)]
pub enum InboxError {
    #[error("invalid input: {0}")]
    InputInvalid(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("state conflict: {0}")]
    StateConflict(String),

    #[error("payment not verified: {reason}")]
    VerificationFailed {
        reason: VerificationReason,
        details: Box<VerificationResult>,
    },

    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(#[from] LedgerError),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<InboxDbError> for InboxError {
    fn from(err: InboxDbError) -> Self {
        match err {
            InboxDbError::NotFound(what) => InboxError::NotFound(what),
            InboxDbError::InvalidTransition(t) => InboxError::StateConflict(t.to_string()),
            InboxDbError::SignatureAlreadyUsed { .. } => InboxError::StateConflict(err.to_string()),
            other => InboxError::Storage(other.to_string()),
        }
    }
}

impl From<InvalidTransition> for InboxError {
    fn from(err: InvalidTransition) -> Self {
        InboxError::StateConflict(err.to_string())
    }
}

impl From<IntentError> for InboxError {
    fn from(err: IntentError) -> Self {
        InboxError::Storage(err.to_string())
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    /// Machine-readable error code.
    pub code: Option<&'static str>,
    /// Verification reason for 402 responses.
    pub reason: Option<VerificationReason>,
    pub details: Option<Value>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<VerificationReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: None,
            reason: None,
            details: None,
        }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message).with_code("not_found")
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message).with_code("invalid_input")
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message).with_code("unauthorized")
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message).with_code("state_conflict")
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message).with_code("unavailable")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message).with_code("internal")
    }
}

impl From<InboxError> for ApiError {
    fn from(err: InboxError) -> Self {
        match err {
            InboxError::InputInvalid(msg) => ApiError::bad_request(msg),
            InboxError::NotFound(msg) => ApiError::not_found(msg),
            InboxError::StateConflict(msg) => ApiError::conflict(msg),
            InboxError::VerificationFailed { reason, details } => ApiError {
                status: StatusCode::PAYMENT_REQUIRED,
                message: format!("Payment not verified: {reason}"),
                code: Some("payment_not_verified"),
                reason: Some(reason),
                details: serde_json::to_value(*details).ok(),
            },
            InboxError::LedgerUnavailable(e) => {
                error!(error = %e, "Ledger request failed");
                ApiError::service_unavailable("Ledger unavailable, retry later")
            }
            InboxError::Storage(msg) => {
                error!(error = %msg, "Storage failure");
                ApiError::internal("Internal storage error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            code: self.code,
            reason: self.reason,
            details: self.details,
        });
        (self.status, body).into_response()
    }
}
