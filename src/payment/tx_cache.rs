// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! LRU cache for fetched ledger transactions.
//!
//! Background scans re-verify the same recent signatures on every sweep.
//! Transactions with metadata are immutable once confirmed, so they are kept
//! for a short TTL. Misses and metadata-less results are never cached: they
//! may still turn into a confirmed transaction.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;

use super::client::{LedgerClient, LedgerError};
use super::transaction::LedgerTransaction;

struct CacheEntry {
    transaction: LedgerTransaction,
    inserted_at: Instant,
}

/// In-process LRU cache keyed by transaction signature.
pub struct TxCache {
    cache: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
}

impl TxCache {
    /// Create a new cache with the given capacity and TTL.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            ttl,
        }
    }

    /// Returns `None` if not cached or expired.
    pub fn get(&self, signature: &str) -> Option<LedgerTransaction> {
        let mut cache = self.cache.lock().ok()?;
        if let Some(entry) = cache.get(signature) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.transaction.clone());
            }
            // Expired
            cache.pop(signature);
        }
        None
    }

    pub fn put(&self, transaction: LedgerTransaction) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(
                transaction.signature.clone(),
                CacheEntry {
                    transaction,
                    inserted_at: Instant::now(),
                },
            );
        }
    }
}

/// [`LedgerClient`] decorator serving repeat `get_transaction` calls from
/// a [`TxCache`].
pub struct CachedLedgerClient {
    inner: Arc<dyn LedgerClient>,
    cache: TxCache,
}

impl CachedLedgerClient {
    pub fn new(inner: Arc<dyn LedgerClient>, capacity: usize, ttl: Duration) -> Self {
        Self {
            inner,
            cache: TxCache::new(capacity, ttl),
        }
    }
}

#[async_trait]
impl LedgerClient for CachedLedgerClient {
    async fn get_transaction(
        &self,
        signature: &str,
    ) -> Result<Option<LedgerTransaction>, LedgerError> {
        if let Some(tx) = self.cache.get(signature) {
            return Ok(Some(tx));
        }

        let fetched = self.inner.get_transaction(signature).await?;
        if let Some(tx) = &fetched {
            if tx.meta.is_some() {
                let mut cached = tx.clone();
                cached.signature = signature.to_string();
                self.cache.put(cached);
            }
        }
        Ok(fetched)
    }

    async fn get_recent_signatures(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<String>, LedgerError> {
        self.inner.get_recent_signatures(address, limit).await
    }
}
