// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Test fixtures: a scripted in-memory ledger and a transaction builder.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::client::{LedgerClient, LedgerError};
use super::transaction::{Instruction, LedgerTransaction, TokenBalance, TransactionMeta};
use super::types::USDC_TOKEN;

pub const PAY_TO: &str = "Bt6CgWWuvV2qjkbbVuwXhLptwMajZVerhAZCF7NA4VWW";
pub const PAYER: &str = "PayerWa11et1111111111111111111111111111111111";
pub const PAYER_ATA: &str = "PayerAta111111111111111111111111111111111111";
pub const PAY_TO_ATA: &str = "PayToAta111111111111111111111111111111111111";
pub const REFERENCE: &str = "REF1";
pub const MEMO: &str = "X:REQ:abc:REF:REF1";

/// Builds [`LedgerTransaction`]s shaped like confirmed SPL payments.
pub struct TxBuilder {
    tx: LedgerTransaction,
}

impl TxBuilder {
    /// Empty transaction from `PAYER` with `PAY_TO_ATA` owned by `PAY_TO`.
    pub fn new(signature: &str) -> Self {
        let mut builder = Self {
            tx: LedgerTransaction {
                signature: signature.to_string(),
                slot: 250_000_000,
                block_time: Some(1_700_000_000),
                account_keys: vec![PAYER.to_string()],
                instructions: Vec::new(),
                meta: Some(TransactionMeta::default()),
            },
        };
        builder.add_token_account(PAYER_ATA, PAYER, USDC_TOKEN.mint, USDC_TOKEN.decimals);
        builder.add_token_account(PAY_TO_ATA, PAY_TO, USDC_TOKEN.mint, USDC_TOKEN.decimals);
        builder
    }

    fn add_token_account(&mut self, address: &str, owner: &str, mint: &str, decimals: u8) {
        let index = self.tx.account_keys.len();
        self.tx.account_keys.push(address.to_string());
        if let Some(meta) = self.tx.meta.as_mut() {
            meta.post_token_balances.push(TokenBalance {
                account_index: index,
                mint: mint.to_string(),
                owner: Some(owner.to_string()),
                amount: 0,
                decimals,
            });
        }
    }

    /// Register a token account for `owner` and return the builder.
    pub fn token_account(mut self, address: &str, owner: &str, mint: &str, decimals: u8) -> Self {
        self.add_token_account(address, owner, mint, decimals);
        self
    }

    pub fn reference(mut self, reference: &str) -> Self {
        self.tx.account_keys.push(reference.to_string());
        self
    }

    pub fn memo(mut self, text: &str) -> Self {
        self.tx.instructions.push(Instruction::Memo(text.to_string()));
        self
    }

    pub fn inner_memo(mut self, text: &str) -> Self {
        if let Some(meta) = self.tx.meta.as_mut() {
            meta.inner_instructions.push(Instruction::Memo(text.to_string()));
        }
        self
    }

    /// Top-level `transferChecked` of USDC into `destination`.
    pub fn transfer_checked_to(mut self, destination: &str, amount: u64, decimals: u8) -> Self {
        self.tx.instructions.push(Instruction::TransferChecked {
            source: PAYER_ATA.to_string(),
            destination: destination.to_string(),
            mint: USDC_TOKEN.mint.to_string(),
            amount,
            decimals,
        });
        self
    }

    /// Top-level USDC `transferChecked` to the recipient.
    pub fn pay(self, amount: u64) -> Self {
        self.transfer_checked_to(PAY_TO_ATA, amount, USDC_TOKEN.decimals)
    }

    /// Inner (CPI) USDC `transferChecked` to the recipient.
    pub fn inner_pay(mut self, amount: u64) -> Self {
        if let Some(meta) = self.tx.meta.as_mut() {
            meta.inner_instructions.push(Instruction::TransferChecked {
                source: PAYER_ATA.to_string(),
                destination: PAY_TO_ATA.to_string(),
                mint: USDC_TOKEN.mint.to_string(),
                amount,
                decimals: USDC_TOKEN.decimals,
            });
        }
        self
    }

    /// Plain `transfer` (no mint on the instruction).
    pub fn plain_transfer_to(mut self, destination: &str, amount: u64) -> Self {
        self.tx.instructions.push(Instruction::Transfer {
            source: PAYER_ATA.to_string(),
            destination: destination.to_string(),
            amount,
        });
        self
    }

    pub fn instruction(mut self, instruction: Instruction) -> Self {
        self.tx.instructions.push(instruction);
        self
    }

    pub fn without_meta(mut self) -> Self {
        self.tx.meta = None;
        self
    }

    pub fn failed(mut self) -> Self {
        if let Some(meta) = self.tx.meta.as_mut() {
            meta.failed = true;
        }
        self
    }

    pub fn build(self) -> LedgerTransaction {
        self.tx
    }
}

/// Fully bound transaction paying `amount` base units of USDC to `PAY_TO`
/// with `REFERENCE` and `MEMO`.
pub fn paying_transaction(signature: &str, amount: u64) -> LedgerTransaction {
    TxBuilder::new(signature)
        .reference(REFERENCE)
        .memo(MEMO)
        .pay(amount)
        .build()
}

/// Fully bound transaction for an arbitrary reference/memo pair.
pub fn bound_transaction(signature: &str, reference: &str, memo: &str, amount: u64) -> LedgerTransaction {
    TxBuilder::new(signature)
        .reference(reference)
        .memo(memo)
        .pay(amount)
        .build()
}

/// In-memory [`LedgerClient`] with call counters and an outage switch.
#[derive(Default)]
pub struct ScriptedLedger {
    transactions: Mutex<HashMap<String, LedgerTransaction>>,
    signatures: Mutex<HashMap<String, Vec<String>>>,
    transaction_fetches: AtomicUsize,
    unavailable: AtomicBool,
}

impl ScriptedLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, tx: LedgerTransaction) {
        self.transactions
            .lock()
            .unwrap()
            .insert(tx.signature.clone(), tx);
    }

    /// Set the newest-first signature list for an address.
    pub fn set_signatures(&self, address: &str, signatures: Vec<String>) {
        self.signatures
            .lock()
            .unwrap()
            .insert(address.to_string(), signatures);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn transaction_fetches(&self) -> usize {
        self.transaction_fetches.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), LedgerError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(LedgerError::Transport("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LedgerClient for ScriptedLedger {
    async fn get_transaction(
        &self,
        signature: &str,
    ) -> Result<Option<LedgerTransaction>, LedgerError> {
        self.check_available()?;
        self.transaction_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.transactions.lock().unwrap().get(signature).cloned())
    }

    async fn get_recent_signatures(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<String>, LedgerError> {
        self.check_available()?;
        Ok(self
            .signatures
            .lock()
            .unwrap()
            .get(address)
            .map(|sigs| sigs.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}
