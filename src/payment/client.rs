// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Solana JSON-RPC client for the two reads payment verification needs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};

use super::transaction::{LedgerTransaction, RpcTransaction};

/// Commitment level used for every read.
const COMMITMENT: &str = "confirmed";

/// Hard cap the RPC applies to `getSignaturesForAddress`.
pub const MAX_SIGNATURES_PER_CALL: usize = 1000;

/// Read access to the ledger.
///
/// Implementations hold no per-call state; concurrent calls are independent.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Fetch a transaction by signature. `Ok(None)` when the ledger has no
    /// record of it.
    async fn get_transaction(
        &self,
        signature: &str,
    ) -> Result<Option<LedgerTransaction>, LedgerError>;

    /// Most recent signatures involving `address`, newest first.
    async fn get_recent_signatures(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<String>, LedgerError>;
}

/// Errors reaching or decoding the ledger. These are faults, never a
/// "not paid" outcome.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("RPC transport error: {0}")]
    Transport(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("RPC response was invalid: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcSignatureInfo {
    signature: String,
}

/// HTTP JSON-RPC client for a Solana cluster.
#[derive(Debug, Clone)]
pub struct SolanaRpcClient {
    rpc_url: url::Url,
    http: Client,
}

impl SolanaRpcClient {
    /// Create a client for the given RPC endpoint.
    pub fn new(rpc_url: &str) -> Result<Self, LedgerError> {
        let rpc_url: url::Url = rpc_url
            .parse()
            .map_err(|e: url::ParseError| LedgerError::InvalidRpcUrl(e.to_string()))?;

        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| LedgerError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { rpc_url, http })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Option<T>, LedgerError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(self.rpc_url.clone())
            .json(&body)
            .send()
            .await
            // Endpoint URLs often embed API keys.
            .map_err(|e| LedgerError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LedgerError::Transport(format!(
                "{method} returned HTTP {status}"
            )));
        }

        let envelope: RpcEnvelope<T> = response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(format!("{method}: {}", e.without_url())))?;

        if let Some(error) = envelope.error {
            return Err(LedgerError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        Ok(envelope.result)
    }
}

#[async_trait]
impl LedgerClient for SolanaRpcClient {
    async fn get_transaction(
        &self,
        signature: &str,
    ) -> Result<Option<LedgerTransaction>, LedgerError> {
        let params = json!([
            signature,
            {
                "encoding": "jsonParsed",
                "commitment": COMMITMENT,
                "maxSupportedTransactionVersion": 0,
            }
        ]);

        let tx: Option<RpcTransaction> = self.call("getTransaction", params).await?;
        Ok(tx.map(|tx| tx.into_ledger_transaction(signature)))
    }

    async fn get_recent_signatures(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<String>, LedgerError> {
        let limit = limit.clamp(1, MAX_SIGNATURES_PER_CALL);
        let params = json!([
            address,
            {
                "limit": limit,
                "commitment": COMMITMENT,
            }
        ]);

        let infos: Option<Vec<RpcSignatureInfo>> =
            self.call("getSignaturesForAddress", params).await?;

        Ok(infos
            .unwrap_or_default()
            .into_iter()
            .map(|info| info.signature)
            .collect())
    }
}
