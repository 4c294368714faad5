// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Typed view of a confirmed ledger transaction.
//!
//! The RPC returns `jsonParsed` transactions whose instruction shapes depend
//! on the program. They are decoded here into a closed set of variants; any
//! shape that is not recognised becomes [`Instruction::Other`] and can never
//! count as a payment.

use serde::Deserialize;
use serde_json::Value;

use super::types::{MEMO_PROGRAM_ID, MEMO_V1_PROGRAM_ID, TOKEN_2022_PROGRAM_ID, TOKEN_PROGRAM_ID};

/// A decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// SPL token `transferChecked` (carries mint and decimals).
    TransferChecked {
        source: String,
        destination: String,
        mint: String,
        amount: u64,
        decimals: u8,
    },
    /// SPL token `transfer` (mint/decimals resolved from balances).
    Transfer {
        source: String,
        destination: String,
        amount: u64,
    },
    /// SPL memo text.
    Memo(String),
    /// Anything else.
    Other { program_id: String },
}

/// Token balance entry from transaction metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBalance {
    pub account_index: usize,
    pub mint: String,
    pub owner: Option<String>,
    pub amount: u64,
    pub decimals: u8,
}

/// Execution metadata; absent when the ledger has no status for the tx.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionMeta {
    /// True when execution failed (no balance changes were applied).
    pub failed: bool,
    pub inner_instructions: Vec<Instruction>,
    pub pre_token_balances: Vec<TokenBalance>,
    pub post_token_balances: Vec<TokenBalance>,
}

/// A transaction as seen by the verifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerTransaction {
    pub signature: String,
    pub slot: u64,
    pub block_time: Option<i64>,
    pub account_keys: Vec<String>,
    pub instructions: Vec<Instruction>,
    pub meta: Option<TransactionMeta>,
}

impl LedgerTransaction {
    /// Look up `(owner, mint, decimals)` for a token account by address.
    pub fn token_account_info(&self, address: &str) -> Option<(&str, &str, u8)> {
        let index = self.account_keys.iter().position(|k| k == address)?;
        let meta = self.meta.as_ref()?;
        meta.post_token_balances
            .iter()
            .chain(meta.pre_token_balances.iter())
            .find(|b| b.account_index == index)
            .and_then(|b| {
                b.owner
                    .as_deref()
                    .map(|owner| (owner, b.mint.as_str(), b.decimals))
            })
    }
}

// =============================================================================
// RPC Shapes (`getTransaction`, encoding = jsonParsed)
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RpcTransaction {
    pub slot: u64,
    pub block_time: Option<i64>,
    pub meta: Option<RpcMeta>,
    pub transaction: RpcTransactionBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcTransactionBody {
    #[serde(default)]
    pub signatures: Vec<String>,
    pub message: RpcMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RpcMessage {
    #[serde(default)]
    pub account_keys: Vec<RpcAccountKey>,
    #[serde(default)]
    pub instructions: Vec<Value>,
}

/// Parsed messages list keys as objects; legacy encodings as plain strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RpcAccountKey {
    Parsed { pubkey: String },
    Plain(String),
}

impl RpcAccountKey {
    fn into_pubkey(self) -> String {
        match self {
            RpcAccountKey::Parsed { pubkey } => pubkey,
            RpcAccountKey::Plain(key) => key,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RpcMeta {
    #[serde(default)]
    pub err: Option<Value>,
    #[serde(default)]
    pub inner_instructions: Option<Vec<RpcInnerInstructions>>,
    #[serde(default)]
    pub pre_token_balances: Option<Vec<RpcTokenBalance>>,
    #[serde(default)]
    pub post_token_balances: Option<Vec<RpcTokenBalance>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcInnerInstructions {
    #[serde(default)]
    pub instructions: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RpcTokenBalance {
    pub account_index: usize,
    pub mint: String,
    #[serde(default)]
    pub owner: Option<String>,
    pub ui_token_amount: RpcTokenAmount,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcTokenAmount {
    pub amount: String,
    pub decimals: u8,
}

/// `{ "program": .., "programId": .., "parsed": .. }`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcParsedInstruction {
    #[serde(default)]
    program: Option<String>,
    #[serde(default)]
    program_id: String,
    #[serde(default)]
    parsed: Option<Value>,
}

/// `{ "type": .., "info": { .. } }` inside a parsed token instruction.
#[derive(Debug, Deserialize)]
struct RpcTokenInstruction {
    #[serde(rename = "type")]
    kind: String,
    info: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferCheckedInfo {
    source: String,
    destination: String,
    mint: String,
    token_amount: RpcTokenAmount,
}

#[derive(Debug, Deserialize)]
struct TransferInfo {
    source: String,
    destination: String,
    amount: String,
}

impl RpcTransaction {
    pub(crate) fn into_ledger_transaction(self, signature: &str) -> LedgerTransaction {
        let RpcTransaction {
            slot,
            block_time,
            meta,
            transaction,
        } = self;

        let signature = transaction
            .signatures
            .into_iter()
            .next()
            .unwrap_or_else(|| signature.to_string());

        LedgerTransaction {
            signature,
            slot,
            block_time,
            account_keys: transaction
                .message
                .account_keys
                .into_iter()
                .map(RpcAccountKey::into_pubkey)
                .collect(),
            instructions: transaction
                .message
                .instructions
                .iter()
                .map(decode_instruction)
                .collect(),
            meta: meta.map(RpcMeta::into_meta),
        }
    }
}

impl RpcMeta {
    fn into_meta(self) -> TransactionMeta {
        TransactionMeta {
            failed: self.err.map(|e| !e.is_null()).unwrap_or(false),
            inner_instructions: self
                .inner_instructions
                .unwrap_or_default()
                .iter()
                .flat_map(|group| group.instructions.iter().map(decode_instruction))
                .collect(),
            pre_token_balances: decode_balances(self.pre_token_balances),
            post_token_balances: decode_balances(self.post_token_balances),
        }
    }
}

fn decode_balances(raw: Option<Vec<RpcTokenBalance>>) -> Vec<TokenBalance> {
    raw.unwrap_or_default()
        .into_iter()
        .filter_map(|b| {
            let amount = b.ui_token_amount.amount.parse::<u64>().ok()?;
            Some(TokenBalance {
                account_index: b.account_index,
                mint: b.mint,
                owner: b.owner,
                amount,
                decimals: b.ui_token_amount.decimals,
            })
        })
        .collect()
}

/// Decode one instruction, failing closed to [`Instruction::Other`].
pub(crate) fn decode_instruction(raw: &Value) -> Instruction {
    let Ok(ix) = RpcParsedInstruction::deserialize(raw) else {
        return Instruction::Other {
            program_id: String::new(),
        };
    };

    let other = || Instruction::Other {
        program_id: ix.program_id.clone(),
    };

    let program_id = ix.program_id.as_str();
    let is_memo = program_id == MEMO_PROGRAM_ID || program_id == MEMO_V1_PROGRAM_ID;
    let is_token = program_id == TOKEN_PROGRAM_ID || program_id == TOKEN_2022_PROGRAM_ID;

    match (ix.program.as_deref(), &ix.parsed) {
        (Some("spl-memo"), Some(Value::String(text))) if is_memo => Instruction::Memo(text.clone()),
        (Some("spl-token"), Some(parsed)) if is_token => {
            decode_token_instruction(parsed).unwrap_or_else(other)
        }
        _ => other(),
    }
}

fn decode_token_instruction(parsed: &Value) -> Option<Instruction> {
    let ix = RpcTokenInstruction::deserialize(parsed).ok()?;
    match ix.kind.as_str() {
        "transferChecked" => {
            let info = TransferCheckedInfo::deserialize(&ix.info).ok()?;
            Some(Instruction::TransferChecked {
                source: info.source,
                destination: info.destination,
                mint: info.mint,
                amount: info.token_amount.amount.parse().ok()?,
                decimals: info.token_amount.decimals,
            })
        }
        "transfer" => {
            let info = TransferInfo::deserialize(&ix.info).ok()?;
            Some(Instruction::Transfer {
                source: info.source,
                destination: info.destination,
                amount: info.amount.parse().ok()?,
            })
        }
        _ => None,
    }
}
