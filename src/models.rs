// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! This module defines the request and response data structures used by
//! the REST API. All types derive `Serialize` and/or `Deserialize` plus
//! `ToSchema` for automatic JSON handling and OpenAPI documentation.
//!
//! ## Model Categories
//!
//! - **Requests**: submission body, snapshots, creation responses
//! - **Payments**: payment intents, the 402 payload, confirm/scan results
//! - **Discovery**: the `.well-known` capabilities document

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::inbox::PricingTier;
use crate::notify::NotifyOutcome;
use crate::payment::{ScanMissReason, VerificationResult};
use crate::storage::{RequestStatus, StoredRequest};

// =============================================================================
// Request Models
// =============================================================================

/// Body of `POST /v1/requests`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct CreateRequestBody {
    /// Short summary of the problem.
    pub title: String,
    /// Full description.
    pub body: String,
    /// Free-form labels, order preserved.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Budget in USD as a decimal string (e.g. `"40"`).
    #[serde(default, alias = "budgetUsd")]
    pub budget_usd: Option<String>,
    /// Tier key from discovery (e.g. `"2h"`); its price is the quote floor.
    #[serde(default, alias = "desiredTier")]
    pub desired_tier: Option<String>,
}

/// Public view of a request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct RequestSnapshot {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub status: RequestStatus,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_usd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_usd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_tx_sig: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
}

impl From<&StoredRequest> for RequestSnapshot {
    fn from(req: &StoredRequest) -> Self {
        Self {
            id: req.id,
            created_at: req.created_at,
            status: req.status,
            title: req.title.clone(),
            body: req.body.clone(),
            tags: req.tags.clone(),
            budget_usd: req.budget.clone(),
            quote_usd: req.quote_amount.clone(),
            quote_message: req.quote_message.clone(),
            paid_tx_sig: req.paid_tx_sig.clone(),
            paid_at: req.paid_at,
        }
    }
}

/// Outcome of a creation call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CreateStatus {
    Rejected,
    RequiresPayment,
    /// Too many open requests; nothing to pay.
    Busy,
}

/// Response of `POST /v1/requests`. Stored verbatim for idempotent replay.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct CreateRequestResponse {
    pub status: CreateStatus,
    pub request: RequestSnapshot,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentIntentView>,
}

// =============================================================================
// Payment Models
// =============================================================================

/// How to pay for a request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct PaymentIntentView {
    /// Token symbol (e.g. `USDC`).
    pub asset: String,
    /// Token mint address.
    pub mint: String,
    /// Decimal amount, exactly as quoted.
    pub amount: String,
    pub recipient: String,
    /// Account key the paying transaction must include.
    pub reference: String,
    /// Memo the paying transaction must carry.
    pub memo: String,
    /// Solana Pay transfer request URL.
    pub pay_url: String,
    /// `null` when intents do not expire.
    pub expires_at: Option<DateTime<Utc>>,
}

/// x402-style 402 body returned while a request awaits payment.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct PaymentRequiredResponse {
    /// Always `payment_required`.
    pub error: String,
    /// Always `x402-payment-required`.
    #[serde(rename = "type")]
    pub kind: String,
    pub request_id: Uuid,
    pub network: String,
    pub payment: PaymentIntentView,
    pub retry_url: String,
}

impl PaymentRequiredResponse {
    pub fn new(request_id: Uuid, network: &str, payment: PaymentIntentView) -> Self {
        Self {
            error: "payment_required".to_string(),
            kind: "x402-payment-required".to_string(),
            request_id,
            network: network.to_string(),
            payment,
            retry_url: format!("/v1/requests/{request_id}"),
        }
    }
}

/// Body of `POST /v1/requests/{id}/confirm`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ConfirmPaymentBody {
    /// Signature of the paying transaction (base58).
    #[serde(alias = "txSig")]
    pub tx_sig: String,
}

/// A request is paid.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct PaymentConfirmedResponse {
    pub ok: bool,
    pub request: RequestSnapshot,
    pub tx_sig: String,
    /// False when the request was already paid before this call.
    pub newly_paid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationResult>,
}

/// Scan found nothing yet.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ScanMissResponse {
    pub ok: bool,
    pub reason: ScanMissReason,
    pub checked: usize,
}

// =============================================================================
// Operator Models
// =============================================================================

/// Request as listed for the operator, with its payment binding.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct OperatorRequestView {
    pub request: RequestSnapshot,
    pub pay_to: Option<String>,
    pub payment_reference: Option<String>,
}

impl From<&StoredRequest> for OperatorRequestView {
    fn from(req: &StoredRequest) -> Self {
        Self {
            request: RequestSnapshot::from(req),
            pay_to: req.pay_to.clone(),
            payment_reference: req.payment_reference.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct RequestListResponse {
    pub requests: Vec<OperatorRequestView>,
}

/// Query for listing endpoints.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

/// Body of `POST /v1/operator/notify/test`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct TestNotificationBody {
    #[serde(default)]
    pub message: Option<String>,
}

/// Per-notifier delivery results.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct NotificationResults {
    pub delivered: bool,
    pub notifications: Vec<NotifyOutcome>,
}

// =============================================================================
// Discovery Models
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ProviderInfo {
    pub handle: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct PaymentCapabilities {
    pub network: String,
    pub asset: String,
    pub mint: String,
    pub decimals: u8,
    pub recipient: String,
    pub memo_namespace: String,
    pub min_quote_usd: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct TierInfo {
    pub key: String,
    pub label: String,
    pub price_usd: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub what_you_get: String,
}

impl From<&PricingTier> for TierInfo {
    fn from(tier: &PricingTier) -> Self {
        Self {
            key: tier.key.clone(),
            label: tier.label.clone(),
            price_usd: tier.price_usd.clone(),
            what_you_get: tier.what_you_get.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct LimitsInfo {
    /// `null` when unlimited.
    pub max_open_requests: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct AvailabilityInfo {
    /// Always `UTC`.
    pub timezone: String,
    pub start_hour: u8,
    pub end_hour: u8,
    pub available_now: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct EndpointInfo {
    pub create_request: String,
    pub get_request: String,
    pub confirm_payment: String,
    pub scan_payment: String,
}

/// `GET /.well-known/escalatex`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct DiscoveryResponse {
    pub protocol: String,
    pub provider: ProviderInfo,
    pub payment: PaymentCapabilities,
    pub availability: AvailabilityInfo,
    pub tiers: Vec<TierInfo>,
    pub limits: LimitsInfo,
    pub endpoints: EndpointInfo,
}
