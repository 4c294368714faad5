// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Operator Authentication
//!
//! Public endpoints (discovery, request intake, payment confirmation) are
//! unauthenticated; the payment binding is the capability. Operator routes
//! require `Authorization: Bearer <OPERATOR_TOKEN>`.
//!
//! - No `OPERATOR_TOKEN` configured: operator routes answer 503
//! - Token comparison is constant-time (HMAC-SHA256 tags)

pub mod error;
pub mod extractor;
pub mod token;

pub use error::AuthError;
pub use extractor::Operator;
pub use token::OperatorToken;
