// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Pull-based payment discovery.
//!
//! Lists the newest signatures touching the recipient and runs the verifier
//! on each, stopping at the first that satisfies the expectation. Signatures
//! the caller reports as already claimed are counted but not verified.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::ToSchema;

use super::client::{LedgerError, MAX_SIGNATURES_PER_CALL};
use super::verifier::{PaymentExpectation, PaymentVerifier, VerificationResult};

/// Why a scan found nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScanMissReason {
    NotFoundInRecent,
}

/// Result of one scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ScanOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_sig: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<VerificationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ScanMissReason>,
    /// Signatures examined before stopping.
    pub checked: usize,
}

impl ScanOutcome {
    fn found(tx_sig: String, details: VerificationResult, checked: usize) -> Self {
        Self {
            ok: true,
            tx_sig: Some(tx_sig),
            details: Some(details),
            reason: None,
            checked,
        }
    }

    fn missed(checked: usize) -> Self {
        Self {
            ok: false,
            tx_sig: None,
            details: None,
            reason: Some(ScanMissReason::NotFoundInRecent),
            checked,
        }
    }
}

/// Scans recent recipient activity for a matching payment.
#[derive(Clone)]
pub struct PaymentScanner {
    verifier: PaymentVerifier,
}

impl PaymentScanner {
    pub fn new(verifier: PaymentVerifier) -> Self {
        Self { verifier }
    }

    /// Verify up to `limit` recent signatures, newest first, skipping those
    /// for which `claimed` is true.
    pub async fn scan<F>(
        &self,
        expectation: &PaymentExpectation,
        limit: usize,
        claimed: F,
    ) -> Result<ScanOutcome, LedgerError>
    where
        F: Fn(&str) -> bool,
    {
        let limit = limit.clamp(1, MAX_SIGNATURES_PER_CALL);
        let signatures = self
            .verifier
            .ledger()
            .get_recent_signatures(&expectation.pay_to, limit)
            .await?;

        let mut checked = 0;
        for signature in signatures.into_iter().take(limit) {
            checked += 1;
            if claimed(&signature) {
                debug!(tx_sig = %signature, "Skipping signature that already paid another request");
                continue;
            }
            let result = self.verifier.verify(&signature, expectation).await?;
            if result.ok {
                info!(
                    tx_sig = %signature,
                    reference = %expectation.required_reference,
                    checked,
                    "Scan found matching payment"
                );
                return Ok(ScanOutcome::found(signature, result, checked));
            }
        }

        debug!(
            reference = %expectation.required_reference,
            checked,
            "No matching payment in recent signatures"
        );
        Ok(ScanOutcome::missed(checked))
    }
}
