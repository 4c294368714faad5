// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Escalation Inbox
//!
//! Request intake and the payment-bound lifecycle:
//!
//! ```text
//! created ──► rejected
//!    │
//!    └──► awaiting_payment ──► paid ──► paid_notified
//! ```
//!
//! - `policy` - accept/reject and quote
//! - `availability` - provider working hours
//! - `tiers` - priced response tiers
//! - `ledger` - the state machine tying storage, verification and notification together

pub mod availability;
pub mod ledger;
pub mod policy;
pub mod tiers;

pub use availability::WorkingHours;
pub use ledger::{CreateOutcome, LedgerSettings, PaymentConfirmation, RequestLedger, ScanResult};
pub use policy::{AcceptanceDecision, AcceptancePolicy, KeywordPolicy};
pub use tiers::PricingTier;
