// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Acceptance policy: accept or reject a request and quote a price.

use std::cmp::Ordering;

use crate::payment::amount::{compare_amounts, format_amount, parse_amount};

/// Decision for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptanceDecision {
    pub accepted: bool,
    /// Decimal quote, present when accepted.
    pub quote_amount: Option<String>,
    pub message: String,
}

/// Decides whether a request is taken on, and for how much.
pub trait AcceptancePolicy: Send + Sync {
    fn evaluate(
        &self,
        title: &str,
        body: &str,
        tags: &[String],
        budget: Option<&str>,
    ) -> AcceptanceDecision;
}

pub const DEFAULT_DISALLOWED: [&str; 5] = ["illegal", "malware", "exploit", "ddos", "hack"];

const REJECTED_MESSAGE: &str = "Not a supported request.";
const ACCEPTED_MESSAGE: &str =
    "Accepted. Pay to start. Response time best-effort; we will ping you on Telegram after payment.";

/// Rejects requests mentioning disallowed words; otherwise quotes the budget
/// when it meets the minimum, else the minimum.
#[derive(Debug, Clone)]
pub struct KeywordPolicy {
    disallowed: Vec<String>,
    min_quote: String,
    decimals: u8,
}

impl KeywordPolicy {
    /// `min_quote` must be a valid decimal at `decimals` precision.
    pub fn new(min_quote: &str, decimals: u8) -> Self {
        Self {
            disallowed: DEFAULT_DISALLOWED.iter().map(|w| w.to_string()).collect(),
            min_quote: normalize(min_quote, decimals).unwrap_or_else(|| min_quote.trim().to_string()),
            decimals,
        }
    }

    #[cfg(test)]
    pub fn with_disallowed<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disallowed = words
            .into_iter()
            .map(|w| Into::<String>::into(w).to_lowercase())
            .collect();
        self
    }

    fn quote_for(&self, budget: Option<&str>) -> String {
        let Some(budget) = budget else {
            return self.min_quote.clone();
        };
        match compare_amounts(budget, &self.min_quote, self.decimals) {
            Ok(Ordering::Greater | Ordering::Equal) => {
                normalize(budget, self.decimals).unwrap_or_else(|| self.min_quote.clone())
            }
            _ => self.min_quote.clone(),
        }
    }
}

fn normalize(amount: &str, decimals: u8) -> Option<String> {
    parse_amount(amount, decimals)
        .ok()
        .map(|base| format_amount(base, decimals))
}

impl AcceptancePolicy for KeywordPolicy {
    fn evaluate(
        &self,
        title: &str,
        body: &str,
        tags: &[String],
        budget: Option<&str>,
    ) -> AcceptanceDecision {
        let text = format!("{title}\n{body}\n{}", tags.join(",")).to_lowercase();
        if self.disallowed.iter().any(|w| text.contains(w.as_str())) {
            return AcceptanceDecision {
                accepted: false,
                quote_amount: None,
                message: REJECTED_MESSAGE.to_string(),
            };
        }

        AcceptanceDecision {
            accepted: true,
            quote_amount: Some(self.quote_for(budget)),
            message: ACCEPTED_MESSAGE.to_string(),
        }
    }
}
