// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger types and constants.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Solana cluster configuration.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Network name for display
    pub name: &'static str,
    /// Identifier used in payment payloads
    pub network_id: &'static str,
    /// Default RPC endpoint URL
    pub rpc_url: &'static str,
    /// Block explorer URL
    pub explorer_url: &'static str,
}

/// Solana mainnet-beta configuration.
pub const SOLANA_MAINNET: NetworkConfig = NetworkConfig {
    name: "Solana Mainnet Beta",
    network_id: "solana",
    rpc_url: "https://api.mainnet-beta.solana.com",
    explorer_url: "https://solscan.io",
};

/// SPL Memo program (v2).
pub const MEMO_PROGRAM_ID: &str = "MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr";

/// SPL Memo program (v1, still accepted by wallets).
pub const MEMO_V1_PROGRAM_ID: &str = "Memo1UhkJRfHyvLMcVucJwxXeuD728EqVDDwQDxFMNo";

/// SPL Token program.
pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

/// SPL Token-2022 program.
pub const TOKEN_2022_PROGRAM_ID: &str = "TokenzQdBNbLqP5VEhdkAS6EPFLC1PazF3h6ap9FN3h2nDM9DX8GFWeF";

/// A fungible SPL token accepted as payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Asset {
    /// Token symbol (e.g., "USDC")
    pub symbol: String,
    /// Mint address on the ledger
    pub mint: String,
    /// Decimal exponent for base units
    pub decimals: u8,
}

impl Asset {
    pub fn new(symbol: impl Into<String>, mint: impl Into<String>, decimals: u8) -> Self {
        Self {
            symbol: symbol.into(),
            mint: mint.into(),
            decimals,
        }
    }

    /// USDC on Solana mainnet.
    pub fn usdc() -> Self {
        Self::new(USDC_TOKEN.symbol, USDC_TOKEN.mint, USDC_TOKEN.decimals)
    }

    /// Resolve a configured symbol to a known asset.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        KNOWN_TOKENS
            .iter()
            .find(|t| t.symbol.eq_ignore_ascii_case(symbol.trim()))
            .map(|t| Self::new(t.symbol, t.mint, t.decimals))
    }
}

/// Static token metadata.
#[derive(Debug, Clone)]
pub struct SplToken {
    pub symbol: &'static str,
    pub mint: &'static str,
    pub decimals: u8,
}

/// Circle USDC on Solana mainnet.
pub const USDC_TOKEN: SplToken = SplToken {
    symbol: "USDC",
    mint: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
    decimals: 6,
};

/// Circle USDC on Solana devnet.
pub const USDC_DEVNET_TOKEN: SplToken = SplToken {
    symbol: "USDC-DEV",
    mint: "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU",
    decimals: 6,
};

const KNOWN_TOKENS: [SplToken; 2] = [USDC_TOKEN, USDC_DEVNET_TOKEN];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_symbols_case_insensitively() {
        let asset = Asset::from_symbol("usdc").expect("USDC is known");
        assert_eq!(asset, Asset::usdc());
        assert_eq!(asset.decimals, 6);
        assert!(Asset::from_symbol("DOGE").is_none());
    }
}
