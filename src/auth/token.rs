// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Constant-time comparison of the operator bearer token.
//!
//! Both tokens are used as HMAC-SHA256 keys over a fixed label and the tags
//! are compared with `verify_slice`, so neither content nor length leaks
//! through timing.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const LABEL: &[u8] = b"escalation-inbox/operator-token";

/// The configured operator token, kept only as its HMAC tag.
#[derive(Clone)]
pub struct OperatorToken {
    tag: Vec<u8>,
}

impl std::fmt::Debug for OperatorToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorToken").finish_non_exhaustive()
    }
}

impl OperatorToken {
    pub fn new(token: &str) -> Option<Self> {
        let mac = keyed(token)?;
        Some(Self {
            tag: mac.finalize().into_bytes().to_vec(),
        })
    }

    pub fn matches(&self, presented: &str) -> bool {
        keyed(presented)
            .map(|mac| mac.verify_slice(&self.tag).is_ok())
            .unwrap_or(false)
    }
}

fn keyed(token: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(token.as_bytes()).ok()?;
    mac.update(LABEL);
    Some(mac)
}
