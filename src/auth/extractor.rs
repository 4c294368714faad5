// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for operator routes.
//!
//! ```rust,ignore
//! async fn unnotified(_: Operator, State(state): State<AppState>) -> ... {}
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;

use super::AuthError;
use crate::state::AppState;

/// Proof that the request carried the operator bearer token.
#[derive(Debug, Clone, Copy)]
pub struct Operator;

impl FromRequestParts<AppState> for Operator {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let expected = state.operator.as_ref().ok_or(AuthError::OperatorDisabled)?;

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthHeader)?;

        if expected.matches(token) {
            Ok(Operator)
        } else {
            warn!(path = %parts.uri.path(), "Rejected operator token");
            Err(AuthError::InvalidToken)
        }
    }
}
