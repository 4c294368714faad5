// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The request ledger: creation, payment confirmation and notification.
//!
//! ## Flow
//!
//! 1. `create_request` evaluates the acceptance policy, issues a payment
//!    intent and commits the row plus idempotency record atomically.
//! 2. `confirm_payment` (client-submitted signature) or `scan_for_payment`
//!    (recent recipient activity) runs the verifier.
//! 3. A verified payment moves the row `awaiting_payment → paid` through the
//!    store's guarded transition. Only the caller that performed the
//!    transition notifies; on delivery the row moves to `paid_notified`.
//!
//! A caller that loses the race to mark a row paid gets the same success
//! answer as the winner, with no second signature and no second notification.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use super::policy::AcceptancePolicy;
use super::tiers::{find_tier, PricingTier};
use crate::error::InboxError;
use crate::models::{
    CreateRequestBody, CreateRequestResponse, CreateStatus, PaymentIntentView, RequestSnapshot,
};
use crate::notify::{NotifierSet, NotifyEvent, NotifyOutcome, PaidNotice};
use crate::payment::amount::{compare_amounts, format_amount};
use crate::payment::{
    parse_amount, Asset, LedgerClient, PaymentExpectation, PaymentIntentBuilder, PaymentScanner,
    PaymentVerifier, ScanOutcome, VerificationResult,
};
use crate::storage::{
    AwaitingPage, CreationCommit, InboxDatabase, PaymentTerms, RequestStatus, StoredRequest,
    Transition,
};

const MAX_TITLE_LEN: usize = 200;
const MAX_BODY_LEN: usize = 10_000;
const MAX_TAGS: usize = 20;
const MAX_TAG_LEN: usize = 50;
const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;
const MAX_SIGNATURE_LEN: usize = 128;

const BUSY_MESSAGE: &str = "At capacity right now. Try again later.";

/// Static settings the ledger needs.
#[derive(Debug, Clone)]
pub struct LedgerSettings {
    pub pay_to: String,
    pub asset: Asset,
    pub intent_ttl: Option<Duration>,
    pub scan_limit: usize,
    /// Base URL for receipt links (`{explorer_url}/tx/{sig}`).
    pub explorer_url: Option<String>,
    pub tiers: Vec<PricingTier>,
    /// Open requests allowed before intake answers `busy`; `None` is unlimited.
    pub max_open_requests: Option<usize>,
}

/// Result of `create_request`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOutcome {
    /// Serialized [`CreateRequestResponse`]; identical for every replay.
    pub body: Vec<u8>,
    /// True when `body` came from an earlier call with the same key.
    pub replayed: bool,
}

/// A request is (now or already) paid.
#[derive(Debug, Clone)]
pub struct PaymentConfirmation {
    pub request: StoredRequest,
    pub tx_sig: String,
    /// False when the request was already paid before this call.
    pub newly_paid: bool,
    pub verification: Option<VerificationResult>,
    pub notifications: Vec<NotifyOutcome>,
}

/// Result of `scan_for_payment`.
#[derive(Debug, Clone)]
pub enum ScanResult {
    Paid(PaymentConfirmation),
    NotFound(ScanOutcome),
}

/// Owns the request lifecycle.
pub struct RequestLedger {
    db: Arc<InboxDatabase>,
    verifier: PaymentVerifier,
    scanner: PaymentScanner,
    intents: PaymentIntentBuilder,
    policy: Arc<dyn AcceptancePolicy>,
    notifiers: NotifierSet,
    settings: LedgerSettings,
}

impl RequestLedger {
    pub fn new(
        db: Arc<InboxDatabase>,
        ledger_client: Arc<dyn LedgerClient>,
        intents: PaymentIntentBuilder,
        policy: Arc<dyn AcceptancePolicy>,
        notifiers: NotifierSet,
        settings: LedgerSettings,
    ) -> Self {
        let verifier = PaymentVerifier::new(ledger_client);
        Self {
            db,
            scanner: PaymentScanner::new(verifier.clone()),
            verifier,
            intents,
            policy,
            notifiers,
            settings,
        }
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    pub fn database(&self) -> &Arc<InboxDatabase> {
        &self.db
    }

    pub fn has_notifiers(&self) -> bool {
        !self.notifiers.is_empty()
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Create a request, or replay the recorded response for a used key.
    pub fn create_request(
        &self,
        idempotency_key: Option<&str>,
        input: CreateRequestBody,
    ) -> Result<CreateOutcome, InboxError> {
        let idempotency_key = validate_idempotency_key(idempotency_key)?;

        if let Some(key) = idempotency_key {
            if let Some(body) = self.db.get_idempotent_response(key)? {
                info!(idempotency_key = %key, "Replaying recorded creation response");
                return Ok(CreateOutcome {
                    body,
                    replayed: true,
                });
            }
        }

        let input = self.validate_input(input)?;
        let tier = match input.desired_tier.as_deref() {
            Some(key) => Some(find_tier(&self.settings.tiers, key).ok_or_else(|| {
                InboxError::InputInvalid(format!("unknown tier `{key}`"))
            })?),
            None => None,
        };
        let mut request = StoredRequest::new(input.title, input.body, input.tags, input.budget_usd);

        let decision = self.policy.evaluate(
            &request.title,
            &request.body,
            &request.tags,
            request.budget.as_deref(),
        );

        let quote = match decision.quote_amount.filter(|_| decision.accepted) {
            Some(quote) if self.at_capacity()? => {
                info!(request_id = %request.id, quote = %quote, "Intake busy");
                None
            }
            Some(quote) => Some(self.apply_tier_floor(quote, tier)?),
            None => None,
        };

        let response = match quote {
            None if decision.accepted => {
                request.reject(BUSY_MESSAGE.to_string())?;
                CreateRequestResponse {
                    status: CreateStatus::Busy,
                    request: RequestSnapshot::from(&request),
                    message: BUSY_MESSAGE.to_string(),
                    payment: None,
                }
            }
            None => {
                request.reject(decision.message.clone())?;
                CreateRequestResponse {
                    status: CreateStatus::Rejected,
                    request: RequestSnapshot::from(&request),
                    message: decision.message,
                    payment: None,
                }
            }
            Some(quote) => {
                let intent = self.intents.build(
                    &request.id.to_string(),
                    &quote,
                    &self.settings.asset,
                    &self.settings.pay_to,
                )?;
                request.accept(PaymentTerms {
                    quote_amount: quote,
                    quote_message: decision.message.clone(),
                    asset_symbol: self.settings.asset.symbol.clone(),
                    pay_to: self.settings.pay_to.clone(),
                    reference: intent.reference,
                    memo: intent.memo,
                })?;
                CreateRequestResponse {
                    status: CreateStatus::RequiresPayment,
                    request: RequestSnapshot::from(&request),
                    message: decision.message,
                    payment: Some(self.payment_intent(&request)?),
                }
            }
        };

        let body = serde_json::to_vec(&response)
            .map_err(|e| InboxError::Storage(format!("failed to serialize response: {e}")))?;

        match self.db.commit_creation(idempotency_key, &request, &body)? {
            CreationCommit::Created => {
                info!(
                    request_id = %request.id,
                    status = %request.status,
                    quote = ?request.quote_amount,
                    "Request created"
                );
                Ok(CreateOutcome {
                    body,
                    replayed: false,
                })
            }
            CreationCommit::Replayed(body) => Ok(CreateOutcome {
                body,
                replayed: true,
            }),
        }
    }

    /// Open requests have reached the configured limit.
    fn at_capacity(&self) -> Result<bool, InboxError> {
        let Some(max) = self.settings.max_open_requests else {
            return Ok(false);
        };
        let awaiting_since = self
            .settings
            .intent_ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .map(|ttl| Utc::now() - ttl);
        Ok(self.db.count_open(awaiting_since)? >= max)
    }

    /// Raise `quote` to the tier price and refuse a quote that asks for
    /// nothing: a zero expectation is met by any bound transaction.
    fn apply_tier_floor(
        &self,
        quote: String,
        tier: Option<&PricingTier>,
    ) -> Result<String, InboxError> {
        let decimals = self.settings.asset.decimals;
        let quote = match tier {
            Some(tier) => {
                let below = compare_amounts(&quote, &tier.price_usd, decimals)
                    .map_err(|e| InboxError::Storage(format!("invalid quote `{quote}`: {e}")))?
                    == Ordering::Less;
                if below {
                    tier.price_usd.clone()
                } else {
                    quote
                }
            }
            None => quote,
        };

        match parse_amount(&quote, decimals) {
            Ok(base) if base > 0 => Ok(format_amount(base, decimals)),
            Ok(_) => Err(InboxError::Storage(
                "acceptance policy quoted zero; refusing to issue a free payment intent".into(),
            )),
            Err(e) => Err(InboxError::Storage(format!("invalid quote `{quote}`: {e}"))),
        }
    }

    fn validate_input(&self, mut input: CreateRequestBody) -> Result<CreateRequestBody, InboxError> {
        input.title = input.title.trim().to_string();
        input.body = input.body.trim().to_string();

        if input.title.is_empty() {
            return Err(InboxError::InputInvalid("title is required".into()));
        }
        if input.title.chars().count() > MAX_TITLE_LEN {
            return Err(InboxError::InputInvalid(format!(
                "title exceeds {MAX_TITLE_LEN} characters"
            )));
        }
        if input.body.is_empty() {
            return Err(InboxError::InputInvalid("body is required".into()));
        }
        if input.body.chars().count() > MAX_BODY_LEN {
            return Err(InboxError::InputInvalid(format!(
                "body exceeds {MAX_BODY_LEN} characters"
            )));
        }

        input.tags = input
            .tags
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if input.tags.len() > MAX_TAGS {
            return Err(InboxError::InputInvalid(format!("at most {MAX_TAGS} tags")));
        }
        if input.tags.iter().any(|t| t.chars().count() > MAX_TAG_LEN) {
            return Err(InboxError::InputInvalid(format!(
                "tags are limited to {MAX_TAG_LEN} characters"
            )));
        }

        input.budget_usd = match input.budget_usd.map(|b| b.trim().to_string()) {
            Some(b) if b.is_empty() => None,
            Some(b) => {
                parse_amount(&b, self.settings.asset.decimals).map_err(|e| {
                    InboxError::InputInvalid(format!("budget_usd: {e}"))
                })?;
                Some(b)
            }
            None => None,
        };

        input.desired_tier = input
            .desired_tier
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        Ok(input)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn get_request(&self, id: &Uuid) -> Result<StoredRequest, InboxError> {
        self.db
            .get_request(id)?
            .ok_or_else(|| InboxError::NotFound(format!("Request {id}")))
    }

    /// Payment intent for a request that has been issued one.
    ///
    /// Not stored: recomputed from the row and the current clock.
    pub fn payment_intent(&self, request: &StoredRequest) -> Result<PaymentIntentView, InboxError> {
        let (pay_to, quote, reference, memo) = payment_binding(request)?;
        let asset = self.asset_for(request)?;

        Ok(PaymentIntentView {
            pay_url: self.intents.pay_url(pay_to, quote, &asset, reference, memo),
            asset: asset.symbol,
            mint: asset.mint,
            amount: quote.to_string(),
            recipient: pay_to.to_string(),
            reference: reference.to_string(),
            memo: memo.to_string(),
            expires_at: self
                .settings
                .intent_ttl
                .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
                .map(|ttl| Utc::now() + ttl),
        })
    }

    pub fn list_unnotified_paid(&self, limit: usize) -> Result<Vec<StoredRequest>, InboxError> {
        Ok(self.db.list_unnotified_paid(limit)?)
    }

    pub fn list_awaiting_payment(&self, limit: usize) -> Result<Vec<StoredRequest>, InboxError> {
        Ok(self.db.list_awaiting_payment(limit)?)
    }

    pub fn awaiting_payment_page(
        &self,
        cursor: Option<&str>,
        created_since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<AwaitingPage, InboxError> {
        Ok(self.db.awaiting_payment_page(cursor, created_since, limit)?)
    }

    // =========================================================================
    // Payment
    // =========================================================================

    /// Verify a client-submitted signature and mark the request paid.
    pub async fn confirm_payment(
        &self,
        id: &Uuid,
        tx_sig: &str,
    ) -> Result<PaymentConfirmation, InboxError> {
        let tx_sig = validate_signature(tx_sig)?;
        let request = self.get_request(id)?;

        if request.status.is_paid() {
            return Ok(already_paid(request));
        }
        ensure_awaiting(&request)?;

        if let Some(other) = self.db.request_id_for_signature(tx_sig)? {
            if other == id.to_string() {
                return Ok(already_paid(self.get_request(id)?));
            }
            return Err(InboxError::StateConflict(format!(
                "transaction {tx_sig} already paid request {other}"
            )));
        }

        let expectation = self.expectation_for(&request)?;
        let result = self.verifier.verify(tx_sig, &expectation).await?;
        if !result.ok {
            let reason = result
                .reason
                .unwrap_or(crate::payment::VerificationReason::InsufficientAmount);
            info!(request_id = %id, tx_sig = %tx_sig, reason = %reason, "Payment not verified");
            return Err(InboxError::VerificationFailed {
                reason,
                details: Box::new(result),
            });
        }

        self.finalize_payment(id, tx_sig, result).await
    }

    /// Look for the payment among the recipient's recent transactions.
    pub async fn scan_for_payment(&self, id: &Uuid) -> Result<ScanResult, InboxError> {
        let request = self.get_request(id)?;

        if request.status.is_paid() {
            return Ok(ScanResult::Paid(already_paid(request)));
        }
        ensure_awaiting(&request)?;

        let expectation = self.expectation_for(&request)?;
        let own_id = id.to_string();
        let claimed_elsewhere = |sig: &str| match self.db.request_id_for_signature(sig) {
            Ok(Some(other)) => other != own_id,
            Ok(None) => false,
            Err(e) => {
                warn!(tx_sig = %sig, error = %e, "Signature index lookup failed");
                false
            }
        };
        let outcome = self
            .scanner
            .scan(&expectation, self.settings.scan_limit, claimed_elsewhere)
            .await?;

        match (outcome.ok, outcome.tx_sig.clone(), outcome.details.clone()) {
            (true, Some(tx_sig), Some(details)) => Ok(ScanResult::Paid(
                self.finalize_payment(id, &tx_sig, details).await?,
            )),
            _ => Ok(ScanResult::NotFound(outcome)),
        }
    }

    async fn finalize_payment(
        &self,
        id: &Uuid,
        tx_sig: &str,
        verification: VerificationResult,
    ) -> Result<PaymentConfirmation, InboxError> {
        let transition = self.db.transition_to_paid(id, tx_sig, Utc::now())?;

        let Transition::Applied(request) = transition else {
            info!(request_id = %id, tx_sig = %tx_sig, "Request already paid by a concurrent call");
            return Ok(already_paid(transition.into_request()));
        };

        info!(request_id = %id, tx_sig = %tx_sig, "Payment verified, request paid");

        let (request, notifications) = self.notify_paid(request).await;
        Ok(PaymentConfirmation {
            tx_sig: tx_sig.to_string(),
            request,
            newly_paid: true,
            verification: Some(verification),
            notifications,
        })
    }

    /// Notify once for a freshly paid request; on any delivery move it to
    /// `paid_notified`.
    async fn notify_paid(&self, request: StoredRequest) -> (StoredRequest, Vec<NotifyOutcome>) {
        if self.notifiers.is_empty() {
            return (request, Vec::new());
        }

        let event = NotifyEvent::Paid(PaidNotice {
            request_id: request.id,
            title: request.title.clone(),
            quote_amount: request.quote_amount.clone(),
            asset_symbol: request
                .payment_asset
                .clone()
                .unwrap_or_else(|| self.settings.asset.symbol.clone()),
            tx_sig: request.paid_tx_sig.clone().unwrap_or_default(),
            receipt_url: self.receipt_url(request.paid_tx_sig.as_deref()),
        });

        let outcomes = self.notifiers.notify_all(&event).await;
        if !outcomes.iter().any(|o| o.ok) {
            warn!(request_id = %request.id, "No notifier delivered; request stays paid");
            return (request, outcomes);
        }

        match self.db.mark_notified(&request.id, Utc::now()) {
            Ok(transition) => (transition.into_request(), outcomes),
            Err(e) => {
                warn!(request_id = %request.id, error = %e, "Failed to record notification");
                (request, outcomes)
            }
        }
    }

    /// Push a free-form message through every notifier.
    pub async fn send_test_notification(&self, text: String) -> Vec<NotifyOutcome> {
        self.notifiers.notify_all(&NotifyEvent::Test(text)).await
    }

    /// Operator acknowledgement: `paid → paid_notified`.
    pub fn mark_notified(&self, id: &Uuid) -> Result<StoredRequest, InboxError> {
        let transition = self.db.mark_notified(id, Utc::now())?;
        if transition.was_applied() {
            info!(request_id = %id, "Request marked notified");
        }
        Ok(transition.into_request())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn asset_for(&self, request: &StoredRequest) -> Result<Asset, InboxError> {
        match request.payment_asset.as_deref() {
            None => Ok(self.settings.asset.clone()),
            Some(symbol) if symbol == self.settings.asset.symbol => Ok(self.settings.asset.clone()),
            Some(symbol) => Asset::from_symbol(symbol)
                .ok_or_else(|| InboxError::Storage(format!("unknown payment asset {symbol}"))),
        }
    }

    fn expectation_for(&self, request: &StoredRequest) -> Result<PaymentExpectation, InboxError> {
        let (pay_to, quote, reference, memo) = payment_binding(request)?;
        PaymentExpectation::new(
            pay_to,
            quote,
            self.asset_for(request)?,
            reference,
            Some(memo.to_string()),
        )
        .map_err(|e| InboxError::Storage(format!("stored quote is invalid: {e}")))
    }

    fn receipt_url(&self, tx_sig: Option<&str>) -> Option<String> {
        let base = self.settings.explorer_url.as_deref()?;
        Some(format!("{}/tx/{}", base.trim_end_matches('/'), tx_sig?))
    }
}

/// `(pay_to, quote, reference, memo)`; all four are set on accepted rows.
fn payment_binding(request: &StoredRequest) -> Result<(&str, &str, &str, &str), InboxError> {
    match (
        request.pay_to.as_deref(),
        request.quote_amount.as_deref(),
        request.payment_reference.as_deref(),
        request.payment_memo.as_deref(),
    ) {
        (Some(pay_to), Some(quote), Some(reference), Some(memo)) => {
            Ok((pay_to, quote, reference, memo))
        }
        _ => Err(InboxError::StateConflict(format!(
            "request {} has no payment intent (status {})",
            request.id, request.status
        ))),
    }
}

fn ensure_awaiting(request: &StoredRequest) -> Result<(), InboxError> {
    if request.status == RequestStatus::AwaitingPayment {
        Ok(())
    } else {
        Err(InboxError::StateConflict(format!(
            "request {} is {} and cannot be paid",
            request.id, request.status
        )))
    }
}

fn already_paid(request: StoredRequest) -> PaymentConfirmation {
    PaymentConfirmation {
        tx_sig: request.paid_tx_sig.clone().unwrap_or_default(),
        request,
        newly_paid: false,
        verification: None,
        notifications: Vec::new(),
    }
}

fn validate_idempotency_key(key: Option<&str>) -> Result<Option<&str>, InboxError> {
    match key.map(str::trim) {
        None | Some("") => Ok(None),
        Some(k) if k.len() > MAX_IDEMPOTENCY_KEY_LEN => Err(InboxError::InputInvalid(format!(
            "Idempotency-Key exceeds {MAX_IDEMPOTENCY_KEY_LEN} bytes"
        ))),
        Some(k) => Ok(Some(k)),
    }
}

fn validate_signature(tx_sig: &str) -> Result<&str, InboxError> {
    let tx_sig = tx_sig.trim();
    if tx_sig.is_empty() {
        return Err(InboxError::InputInvalid("tx_sig is required".into()));
    }
    if tx_sig.len() > MAX_SIGNATURE_LEN || bs58::decode(tx_sig).into_vec().is_err() {
        return Err(InboxError::InputInvalid(
            "tx_sig must be a base58 transaction signature".into(),
        ));
    }
    Ok(tx_sig)
}
