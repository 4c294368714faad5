// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request records and their lifecycle.
//!
//! ```text
//! created ──► rejected
//!    │
//!    └──────► awaiting_payment ──► paid ──► paid_notified
//! ```
//!
//! `created` only exists in memory while the acceptance decision is made;
//! rows are persisted as `rejected` or `awaiting_payment`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Request lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Submitted, acceptance not yet decided
    Created,
    /// Declined by the acceptance policy (terminal)
    Rejected,
    /// Accepted and quoted; waiting for an on-chain payment
    AwaitingPayment,
    /// Payment verified
    Paid,
    /// Payment verified and the provider has been told (terminal)
    PaidNotified,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Created => "created",
            RequestStatus::Rejected => "rejected",
            RequestStatus::AwaitingPayment => "awaiting_payment",
            RequestStatus::Paid => "paid",
            RequestStatus::PaidNotified => "paid_notified",
        }
    }

    /// The complete transition table.
    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        use RequestStatus::*;
        matches!(
            (self, next),
            (Created, Rejected) | (Created, AwaitingPayment) | (AwaitingPayment, Paid) | (Paid, PaidNotified)
        )
    }

    /// `paid` or `paid_notified`.
    pub fn is_paid(self) -> bool {
        matches!(self, RequestStatus::Paid | RequestStatus::PaidNotified)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transition outside the table was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot move request from {from} to {to}")]
pub struct InvalidTransition {
    pub from: RequestStatus,
    pub to: RequestStatus,
}

/// Payment terms attached when a request is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentTerms {
    pub quote_amount: String,
    pub quote_message: String,
    pub asset_symbol: String,
    pub pay_to: String,
    pub reference: String,
    pub memo: String,
}

/// Persisted request row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRequest {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub status: RequestStatus,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote_amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_asset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pay_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_memo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_tx_sig: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notified_at: Option<DateTime<Utc>>,
}

impl StoredRequest {
    /// A fresh request in the transient `created` state.
    pub fn new(title: String, body: String, tags: Vec<String>, budget: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            status: RequestStatus::Created,
            title,
            body,
            tags,
            budget,
            quote_amount: None,
            quote_message: None,
            payment_asset: None,
            pay_to: None,
            payment_reference: None,
            payment_memo: None,
            paid_tx_sig: None,
            paid_at: None,
            notified_at: None,
        }
    }

    /// Move to `next` if the transition table allows it.
    pub fn advance(&mut self, next: RequestStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// `created → rejected`. No payment fields are set.
    pub fn reject(&mut self, message: String) -> Result<(), InvalidTransition> {
        self.advance(RequestStatus::Rejected)?;
        self.quote_message = Some(message);
        Ok(())
    }

    /// `created → awaiting_payment` with the issued terms.
    pub fn accept(&mut self, terms: PaymentTerms) -> Result<(), InvalidTransition> {
        self.advance(RequestStatus::AwaitingPayment)?;
        self.quote_amount = Some(terms.quote_amount);
        self.quote_message = Some(terms.quote_message);
        self.payment_asset = Some(terms.asset_symbol);
        self.pay_to = Some(terms.pay_to);
        self.payment_reference = Some(terms.reference);
        self.payment_memo = Some(terms.memo);
        Ok(())
    }

    /// `awaiting_payment → paid`, recording the paying signature once.
    pub fn mark_paid(&mut self, tx_sig: &str, paid_at: DateTime<Utc>) -> Result<(), InvalidTransition> {
        self.advance(RequestStatus::Paid)?;
        self.paid_tx_sig = Some(tx_sig.to_string());
        self.paid_at = Some(paid_at);
        Ok(())
    }

    /// `paid → paid_notified`.
    pub fn mark_notified(&mut self, at: DateTime<Utc>) -> Result<(), InvalidTransition> {
        self.advance(RequestStatus::PaidNotified)?;
        self.notified_at = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms() -> PaymentTerms {
        PaymentTerms {
            quote_amount: "25".into(),
            quote_message: "Accepted".into(),
            asset_symbol: "USDC".into(),
            pay_to: "Recipient111".into(),
            reference: "REF1".into(),
            memo: "X:REQ:abc:REF:REF1".into(),
        }
    }

    fn request() -> StoredRequest {
        StoredRequest::new("Title".into(), "Body".into(), vec!["infra".into()], None)
    }

    #[test]
    fn transition_table_is_closed() {
        use RequestStatus::*;
        let all = [Created, Rejected, AwaitingPayment, Paid, PaidNotified];
        let allowed: Vec<_> = all
            .iter()
            .flat_map(|a| all.iter().map(move |b| (*a, *b)))
            .filter(|(a, b)| a.can_transition_to(*b))
            .collect();
        assert_eq!(
            allowed,
            vec![
                (Created, Rejected),
                (Created, AwaitingPayment),
                (AwaitingPayment, Paid),
                (Paid, PaidNotified),
            ]
        );
    }

    #[test]
    fn happy_path_advances_forward() {
        let mut req = request();
        req.accept(terms()).unwrap();
        assert_eq!(req.status, RequestStatus::AwaitingPayment);
        assert_eq!(req.payment_reference.as_deref(), Some("REF1"));

        let now = Utc::now();
        req.mark_paid("SIG", now).unwrap();
        assert_eq!(req.paid_tx_sig.as_deref(), Some("SIG"));
        assert_eq!(req.paid_at, Some(now));

        req.mark_notified(now).unwrap();
        assert_eq!(req.status, RequestStatus::PaidNotified);
    }

    #[test]
    fn rejected_request_has_no_payment_fields() {
        let mut req = request();
        req.reject("Declined".into()).unwrap();
        assert_eq!(req.status, RequestStatus::Rejected);
        assert!(req.payment_reference.is_none());
        assert!(req.pay_to.is_none());
        assert!(req.accept(terms()).is_err());
    }

    #[test]
    fn paid_signature_is_never_overwritten() {
        let mut req = request();
        req.accept(terms()).unwrap();
        req.mark_paid("FIRST", Utc::now()).unwrap();

        let err = req.mark_paid("SECOND", Utc::now()).unwrap_err();
        assert_eq!(err.from, RequestStatus::Paid);
        assert_eq!(req.paid_tx_sig.as_deref(), Some("FIRST"));
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(RequestStatus::AwaitingPayment).unwrap(),
            "awaiting_payment"
        );
        assert_eq!(RequestStatus::PaidNotified.to_string(), "paid_notified");
    }
}
