// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Payment verification.
//!
//! A transaction satisfies a request when, in this order:
//!
//! 1. it exists and has execution metadata,
//! 2. the request's reference appears among its account keys,
//! 3. a top-level memo instruction contains the request's memo,
//! 4. the USDC transfers into token accounts owned by the recipient sum to at
//!    least the quoted amount.
//!
//! The first failing step decides the reason. "Not paid" is a normal
//! [`VerificationResult`]; only ledger faults are errors.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use super::amount::{parse_amount, AmountError};
use super::client::{LedgerClient, LedgerError};
use super::intent::MemoBinding;
use super::transaction::{Instruction, LedgerTransaction};
use super::types::Asset;

/// Why a transaction did not satisfy an expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VerificationReason {
    NotFound,
    NoMetadata,
    MissingReference,
    MissingMemo,
    InsufficientAmount,
}

impl VerificationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationReason::NotFound => "not_found",
            VerificationReason::NoMetadata => "no_metadata",
            VerificationReason::MissingReference => "missing_reference",
            VerificationReason::MissingMemo => "missing_memo",
            VerificationReason::InsufficientAmount => "insufficient_amount",
        }
    }
}

impl fmt::Display for VerificationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a paying transaction must look like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentExpectation {
    pub pay_to: String,
    pub expected_amount: String,
    pub expected_base: u64,
    pub asset: Asset,
    pub required_reference: String,
    pub required_memo: Option<String>,
}

impl PaymentExpectation {
    /// Build an expectation, converting the decimal amount to base units.
    pub fn new(
        pay_to: impl Into<String>,
        expected_amount: &str,
        asset: Asset,
        required_reference: impl Into<String>,
        required_memo: Option<String>,
    ) -> Result<Self, AmountError> {
        let expected_base = parse_amount(expected_amount, asset.decimals)?;
        Ok(Self {
            pay_to: pay_to.into(),
            expected_amount: expected_amount.trim().to_string(),
            expected_base,
            asset,
            required_reference: required_reference.into(),
            required_memo,
        })
    }
}

/// One transfer counted towards the expected amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MatchedTransfer {
    pub source: String,
    pub destination: String,
    pub amount_base: u64,
    /// True when the transfer came from an inner (CPI) instruction.
    pub inner: bool,
}

/// Outcome of verifying one transaction against one expectation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VerificationResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<VerificationReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_base: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_base: Option<u64>,
    pub matched_transfers: Vec<MatchedTransfer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_time: Option<i64>,
}

impl VerificationResult {
    fn rejected(reason: VerificationReason) -> Self {
        Self {
            ok: false,
            reason: Some(reason),
            expected_base: None,
            total_base: None,
            matched_transfers: Vec::new(),
            slot: None,
            block_time: None,
        }
    }

    fn rejected_at(reason: VerificationReason, tx: &LedgerTransaction) -> Self {
        Self {
            slot: Some(tx.slot),
            block_time: tx.block_time,
            ..Self::rejected(reason)
        }
    }
}

/// Verifies claimed payments against the ledger.
#[derive(Clone)]
pub struct PaymentVerifier {
    ledger: Arc<dyn LedgerClient>,
}

impl PaymentVerifier {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerClient> {
        &self.ledger
    }

    /// Fetch `tx_sig` and evaluate it.
    pub async fn verify(
        &self,
        tx_sig: &str,
        expectation: &PaymentExpectation,
    ) -> Result<VerificationResult, LedgerError> {
        let Some(tx) = self.ledger.get_transaction(tx_sig).await? else {
            debug!(tx_sig = %tx_sig, "Transaction not found");
            return Ok(VerificationResult::rejected(VerificationReason::NotFound));
        };
        Ok(evaluate_transaction(&tx, expectation))
    }
}

/// Evaluate an already fetched transaction. Deterministic for a given input.
pub fn evaluate_transaction(
    tx: &LedgerTransaction,
    expectation: &PaymentExpectation,
) -> VerificationResult {
    let Some(meta) = tx.meta.as_ref() else {
        return VerificationResult::rejected_at(VerificationReason::NoMetadata, tx);
    };

    if !tx
        .account_keys
        .iter()
        .any(|key| key == &expectation.required_reference)
    {
        return VerificationResult::rejected_at(VerificationReason::MissingReference, tx);
    }

    if let Some(required_memo) = &expectation.required_memo {
        if !has_top_level_memo(tx, required_memo) {
            log_memo_mismatch(tx);
            return VerificationResult::rejected_at(VerificationReason::MissingMemo, tx);
        }
    }

    let matched_transfers = if meta.failed {
        debug!(tx_sig = %tx.signature, "Transaction failed on-chain; no funds moved");
        Vec::new()
    } else {
        matching_transfers(tx, expectation)
    };

    let total_base = matched_transfers
        .iter()
        .fold(0u64, |acc, t| acc.saturating_add(t.amount_base));
    let ok = total_base >= expectation.expected_base;

    VerificationResult {
        ok,
        reason: (!ok).then_some(VerificationReason::InsufficientAmount),
        expected_base: Some(expectation.expected_base),
        total_base: Some(total_base),
        matched_transfers,
        slot: Some(tx.slot),
        block_time: tx.block_time,
    }
}

fn has_top_level_memo(tx: &LedgerTransaction, required_memo: &str) -> bool {
    tx.instructions.iter().any(|ix| match ix {
        Instruction::Memo(text) => text.contains(required_memo),
        _ => false,
    })
}

fn log_memo_mismatch(tx: &LedgerTransaction) {
    for ix in &tx.instructions {
        if let Instruction::Memo(text) = ix {
            if let Some(binding) = MemoBinding::parse(text) {
                debug!(
                    tx_sig = %tx.signature,
                    memo_request_id = %binding.request_id,
                    memo_reference = %binding.reference,
                    "Memo binds a different request"
                );
            }
        }
    }
}

/// Transfers of the expected mint into accounts owned by `pay_to`.
fn matching_transfers(
    tx: &LedgerTransaction,
    expectation: &PaymentExpectation,
) -> Vec<MatchedTransfer> {
    let inner = tx
        .meta
        .iter()
        .flat_map(|meta| meta.inner_instructions.iter().map(|ix| (ix, true)));

    let mut matched = Vec::new();
    for (ix, is_inner) in tx.instructions.iter().map(|ix| (ix, false)).chain(inner) {
        let (source, destination, amount, mint, decimals) = match ix {
            Instruction::TransferChecked {
                source,
                destination,
                mint,
                amount,
                decimals,
            } => (source, destination, *amount, mint.as_str(), *decimals),
            Instruction::Transfer {
                source,
                destination,
                amount,
            } => {
                let Some((_, mint, decimals)) = tx.token_account_info(destination) else {
                    continue;
                };
                (source, destination, *amount, mint, decimals)
            }
            _ => continue,
        };

        if mint != expectation.asset.mint {
            continue;
        }
        if decimals != expectation.asset.decimals {
            debug!(
                tx_sig = %tx.signature,
                decimals,
                expected = expectation.asset.decimals,
                "Ignoring transfer with mismatched decimals"
            );
            continue;
        }

        let Some((owner, account_mint, _)) = tx.token_account_info(destination) else {
            continue;
        };
        if owner != expectation.pay_to || account_mint != expectation.asset.mint {
            continue;
        }

        matched.push(MatchedTransfer {
            source: source.clone(),
            destination: destination.clone(),
            amount_base: amount,
            inner: is_inner,
        });
    }
    matched
}
