// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Solana payment integration.
//!
//! This module provides functionality for:
//! - Building payment intents (reference, memo, Solana Pay URL)
//! - Reading transactions and recent signatures over JSON-RPC
//! - Verifying that a transaction pays a specific request
//! - Scanning recent recipient activity for a matching payment

pub mod amount;
pub mod client;
pub mod intent;
pub mod scanner;
pub mod transaction;
pub mod tx_cache;
pub mod types;
pub mod verifier;

#[cfg(test)]
pub(crate) mod testing;

pub use amount::{format_amount, parse_amount, AmountError};
pub use client::{LedgerClient, LedgerError, SolanaRpcClient};
pub use intent::{IntentError, MemoBinding, PaymentIntent, PaymentIntentBuilder};
pub use scanner::{PaymentScanner, ScanMissReason, ScanOutcome};
pub use transaction::{Instruction, LedgerTransaction};
pub use tx_cache::CachedLedgerClient;
pub use types::*;
pub use verifier::{
    evaluate_transaction, MatchedTransfer, PaymentExpectation, PaymentVerifier,
    VerificationReason, VerificationResult,
};
