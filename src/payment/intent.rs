// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Payment intent construction.
//!
//! Every accepted request gets a fresh **reference** (a random 32-byte value
//! encoded like a Solana account address) and a **memo** that embeds both the
//! request ID and the reference:
//!
//! ```text
//! Escalatex402:REQ:<request_id>:REF:<reference>
//! ```
//!
//! Wallets following Solana Pay add the reference as a read-only account key
//! and the memo as an SPL Memo instruction, which is what the verifier later
//! checks for. The pay URL itself is presentational; nothing trusts it.

use ring::rand::{SecureRandom, SystemRandom};
use url::form_urlencoded;

use super::types::Asset;

/// Default memo namespace.
pub const DEFAULT_MEMO_NAMESPACE: &str = "Escalatex402";

/// Reference length in bytes (same size as an ed25519 public key).
const REFERENCE_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum IntentError {
    #[error("system randomness unavailable")]
    Randomness,
}

/// Binding values derived for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    pub reference: String,
    pub memo: String,
    pub pay_url: String,
}

/// `(request_id, reference)` recovered from a memo string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoBinding {
    pub namespace: String,
    pub request_id: String,
    pub reference: String,
}

impl MemoBinding {
    /// Parse `<namespace>:REQ:<request_id>:REF:<reference>`.
    ///
    /// The memo may be embedded in a longer string (some wallets prefix memo
    /// text); the first well-formed binding wins.
    pub fn parse(text: &str) -> Option<Self> {
        let req_at = text.find(":REQ:")?;
        let namespace = text[..req_at]
            .rsplit(|c: char| c.is_whitespace())
            .next()
            .unwrap_or_default();
        let rest = &text[req_at + ":REQ:".len()..];
        let (request_id, rest) = rest.split_once(":REF:")?;
        let reference: String = rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect();

        if namespace.is_empty() || request_id.is_empty() || reference.is_empty() {
            return None;
        }

        Some(Self {
            namespace: namespace.to_string(),
            request_id: request_id.to_string(),
            reference,
        })
    }
}

/// Builds references, memos and Solana Pay URLs.
#[derive(Clone)]
pub struct PaymentIntentBuilder {
    namespace: String,
    label: Option<String>,
    rng: SystemRandom,
}

impl std::fmt::Debug for PaymentIntentBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentIntentBuilder")
            .field("namespace", &self.namespace)
            .field("label", &self.label)
            .finish()
    }
}

impl Default for PaymentIntentBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MEMO_NAMESPACE)
    }
}

impl PaymentIntentBuilder {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            label: None,
            rng: SystemRandom::new(),
        }
    }

    /// Set the wallet-facing label shown in the pay URL.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Derive a fresh intent for a request.
    pub fn build(
        &self,
        request_id: &str,
        quote_amount: &str,
        asset: &Asset,
        recipient: &str,
    ) -> Result<PaymentIntent, IntentError> {
        let reference = self.generate_reference()?;
        let memo = self.memo_for(request_id, &reference);
        let pay_url = self.pay_url(recipient, quote_amount, asset, &reference, &memo);
        Ok(PaymentIntent {
            reference,
            memo,
            pay_url,
        })
    }

    /// Random, never-reused reference identifier.
    pub fn generate_reference(&self) -> Result<String, IntentError> {
        let mut bytes = [0u8; REFERENCE_LEN];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| IntentError::Randomness)?;
        Ok(bs58::encode(bytes).into_string())
    }

    pub fn memo_for(&self, request_id: &str, reference: &str) -> String {
        format!("{}:REQ:{}:REF:{}", self.namespace, request_id, reference)
    }

    /// Render a Solana Pay transfer request URL.
    pub fn pay_url(
        &self,
        recipient: &str,
        amount: &str,
        asset: &Asset,
        reference: &str,
        memo: &str,
    ) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("amount", amount)
            .append_pair("spl-token", &asset.mint)
            .append_pair("reference", reference);
        if let Some(label) = &self.label {
            query.append_pair("label", label);
        }
        query.append_pair("memo", memo);

        format!("solana:{recipient}?{}", query.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const RECIPIENT: &str = "Bt6CgWWuvV2qjkbbVuwXhLptwMajZVerhAZCF7NA4VWW";

    #[test]
    fn reference_is_32_random_bytes_in_base58() {
        let builder = PaymentIntentBuilder::default();
        let reference = builder.generate_reference().unwrap();
        let decoded = bs58::decode(&reference).into_vec().unwrap();
        assert_eq!(decoded.len(), REFERENCE_LEN);
    }

    #[test]
    fn references_do_not_repeat() {
        let builder = PaymentIntentBuilder::default();
        let refs: HashSet<String> = (0..500)
            .map(|_| builder.generate_reference().unwrap())
            .collect();
        assert_eq!(refs.len(), 500);
    }

    #[test]
    fn memo_embeds_request_and_reference() {
        let builder = PaymentIntentBuilder::default();
        let intent = builder
            .build("abc", "10", &Asset::usdc(), RECIPIENT)
            .unwrap();
        assert_eq!(
            intent.memo,
            format!("Escalatex402:REQ:abc:REF:{}", intent.reference)
        );

        let binding = MemoBinding::parse(&intent.memo).expect("memo parses");
        assert_eq!(binding.namespace, "Escalatex402");
        assert_eq!(binding.request_id, "abc");
        assert_eq!(binding.reference, intent.reference);
    }

    #[test]
    fn memo_parser_tolerates_surrounding_text() {
        let binding = MemoBinding::parse("paid via wallet X:REQ:r-1:REF:REF1 thanks").unwrap();
        assert_eq!(binding.namespace, "X");
        assert_eq!(binding.request_id, "r-1");
        assert_eq!(binding.reference, "REF1");

        assert!(MemoBinding::parse("no binding here").is_none());
        assert!(MemoBinding::parse(":REQ:abc:REF:").is_none());
    }

    #[test]
    fn pay_url_carries_all_fields() {
        let builder = PaymentIntentBuilder::new("X").with_label("Neojack");
        let url = builder.pay_url(RECIPIENT, "10.5", &Asset::usdc(), "REF1", "X:REQ:abc:REF:REF1");

        assert!(url.starts_with(&format!("solana:{RECIPIENT}?")));
        assert!(url.contains("amount=10.5"));
        assert!(url.contains("spl-token=EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"));
        assert!(url.contains("reference=REF1"));
        assert!(url.contains("label=Neojack"));
        assert!(url.contains("memo=X%3AREQ%3Aabc%3AREF%3AREF1"));
    }
}
