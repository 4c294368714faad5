// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Escalation Inbox - payment-bound support requests settled in USDC on Solana
//!
//! Third parties discover the provider, submit a request, receive a quote and
//! a payment intent, pay on-chain, and the payment is verified against the
//! ledger before the request becomes actionable and the provider is notified.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Operator bearer-token authentication
//! - `inbox` - Acceptance policy, availability and the request state machine
//! - `notify` - Notifier fan-out (Telegram)
//! - `payment` - Payment intents, ledger client, verification and scanning
//! - `payment_poller` - Background scan of requests awaiting payment
//! - `storage` - redb-backed request store and idempotency records

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod inbox;
pub mod logging;
pub mod models;
pub mod notify;
pub mod payment;
pub mod payment_poller;
pub mod state;
pub mod storage;
