// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Priced response tiers.
//!
//! Tiers are published in discovery. A request naming a tier is quoted at
//! least the tier price.

use std::collections::HashSet;

use crate::payment::amount::{format_amount, parse_amount, AmountError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingTier {
    pub key: String,
    pub label: String,
    /// Decimal USD price, normalized.
    pub price_usd: String,
    pub what_you_get: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TierError {
    #[error("expected `key=price`, got `{0}`")]
    Malformed(String),

    #[error("tier `{key}`: {source}")]
    Price { key: String, source: AmountError },

    #[error("tier `{0}` must have a positive price")]
    Free(String),

    #[error("tier `{0}` is listed twice")]
    Duplicate(String),
}

/// Built-in tiers: `(key, label, price, what you get)`.
const DEFAULT_TIERS: [(&str, &str, &str, &str); 3] = [
    ("24h", "24h response", "10", "Priority review + response within 24h."),
    ("2h", "2h response", "50", "Priority review + response within 2h."),
    ("15m", "15m interrupt", "200", "Interrupt tier. You jump the queue (best-effort)."),
];

pub fn default_tiers() -> Vec<PricingTier> {
    DEFAULT_TIERS
        .iter()
        .map(|(key, label, price, what)| PricingTier {
            key: key.to_string(),
            label: label.to_string(),
            price_usd: price.to_string(),
            what_you_get: what.to_string(),
        })
        .collect()
}

/// Parse `key=price[,key=price...]`.
///
/// Built-in keys keep their label and description; other keys use the key as
/// label.
pub fn parse_tiers(spec: &str, decimals: u8) -> Result<Vec<PricingTier>, TierError> {
    let mut seen = HashSet::new();
    let mut tiers = Vec::new();

    for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (key, price) = entry
            .split_once('=')
            .map(|(k, p)| (k.trim(), p.trim()))
            .filter(|(k, _)| !k.is_empty())
            .ok_or_else(|| TierError::Malformed(entry.to_string()))?;

        let base = parse_amount(price, decimals).map_err(|source| TierError::Price {
            key: key.to_string(),
            source,
        })?;
        if base == 0 {
            return Err(TierError::Free(key.to_string()));
        }
        if !seen.insert(key.to_string()) {
            return Err(TierError::Duplicate(key.to_string()));
        }

        let builtin = DEFAULT_TIERS.iter().find(|(k, ..)| *k == key);
        tiers.push(PricingTier {
            key: key.to_string(),
            label: builtin.map_or_else(|| key.to_string(), |(_, label, ..)| label.to_string()),
            price_usd: format_amount(base, decimals),
            what_you_get: builtin.map_or_else(String::new, |(.., what)| what.to_string()),
        });
    }

    Ok(tiers)
}

pub fn find_tier<'a>(tiers: &'a [PricingTier], key: &str) -> Option<&'a PricingTier> {
    tiers.iter().find(|t| t.key.eq_ignore_ascii_case(key))
}
