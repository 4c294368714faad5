// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded request database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `requests`: request id → serialized StoredRequest
//! - `payment_references`: payment reference → request id (unique)
//! - `paid_signatures`: transaction signature → request id (unique)
//! - `pending_payments`: request id → created_at (awaiting_payment rows)
//! - `unnotified`: request id → paid_at (paid but not yet notified)
//! - `idempotency`: idempotency key → response bytes
//!
//! Every status change runs its read-check-write inside a single redb write
//! transaction. redb admits one writer at a time, so each transition is an
//! atomic conditional update.

use std::ops::Bound;
use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use uuid::Uuid;

use super::idempotency;
use super::requests::{InvalidTransition, RequestStatus, StoredRequest};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: request id → serialized StoredRequest (JSON bytes).
pub(super) const REQUESTS: TableDefinition<&str, &[u8]> = TableDefinition::new("requests");

/// Unique index: payment reference → request id.
const PAYMENT_REFERENCES: TableDefinition<&str, &str> = TableDefinition::new("payment_references");

/// Unique index: paying transaction signature → request id.
const PAID_SIGNATURES: TableDefinition<&str, &str> = TableDefinition::new("paid_signatures");

/// Work queue: awaiting_payment request id → created_at (unix seconds).
const PENDING_PAYMENTS: TableDefinition<&str, i64> = TableDefinition::new("pending_payments");

/// Work queue: paid request id → paid_at (unix seconds).
const UNNOTIFIED: TableDefinition<&str, i64> = TableDefinition::new("unnotified");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum InboxDbError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("payment reference already issued: {0}")]
    DuplicateReference(String),

    #[error("transaction {tx_sig} already paid request {request_id}")]
    SignatureAlreadyUsed { tx_sig: String, request_id: String },
}

pub type InboxDbResult<T> = Result<T, InboxDbError>;

/// Outcome of committing a new request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreationCommit {
    /// This call wrote the row; its response is now the recorded one.
    Created,
    /// The idempotency key was already used; these are the recorded bytes.
    Replayed(Vec<u8>),
}

/// Outcome of a guarded status transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// This call performed the transition.
    Applied(StoredRequest),
    /// The row had already reached the target state; nothing was written.
    AlreadyDone(StoredRequest),
}

impl Transition {
    #[cfg(test)]
    pub fn request(&self) -> &StoredRequest {
        match self {
            Transition::Applied(req) | Transition::AlreadyDone(req) => req,
        }
    }

    pub fn into_request(self) -> StoredRequest {
        match self {
            Transition::Applied(req) | Transition::AlreadyDone(req) => req,
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, Transition::Applied(_))
    }
}

/// A slice of the awaiting-payment queue, in key order.
#[derive(Debug, Default)]
pub struct AwaitingPage {
    pub requests: Vec<StoredRequest>,
    /// Rows passed over as created before the cutoff.
    pub skipped_stale: usize,
    /// Where the next page starts; `None` once the end of the queue was reached.
    pub next_cursor: Option<String>,
}

// =============================================================================
// InboxDatabase
// =============================================================================

/// Embedded ACID request database.
pub struct InboxDatabase {
    pub(super) db: Database,
}

impl InboxDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> InboxDbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(REQUESTS)?;
            let _ = write_txn.open_table(PAYMENT_REFERENCES)?;
            let _ = write_txn.open_table(PAID_SIGNATURES)?;
            let _ = write_txn.open_table(PENDING_PAYMENTS)?;
            let _ = write_txn.open_table(UNNOTIFIED)?;
            let _ = write_txn.open_table(idempotency::IDEMPOTENCY)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Cheap read to confirm the database is usable.
    pub fn ping(&self) -> InboxDbResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(REQUESTS)?;
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn get_request(&self, id: &Uuid) -> InboxDbResult<Option<StoredRequest>> {
        let key = id.to_string();
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(REQUESTS)?;
        match table.get(key.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Which request a payment reference was issued to.
    #[cfg(test)]
    pub fn request_id_for_reference(&self, reference: &str) -> InboxDbResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PAYMENT_REFERENCES)?;
        Ok(table.get(reference)?.map(|v| v.value().to_string()))
    }

    /// Which request a transaction signature paid, if any.
    pub fn request_id_for_signature(&self, tx_sig: &str) -> InboxDbResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PAID_SIGNATURES)?;
        Ok(table.get(tx_sig)?.map(|v| v.value().to_string()))
    }

    /// `awaiting_payment` requests, newest first.
    pub fn list_awaiting_payment(&self, limit: usize) -> InboxDbResult<Vec<StoredRequest>> {
        let mut rows = self.list_queue(PENDING_PAYMENTS)?;
        rows.sort_by(|a, b| b.1.cmp(&a.1));
        self.load_rows(rows, limit)
    }

    /// Up to `limit` awaiting rows after `cursor`, skipping rows created
    /// before `created_since`. Stale rows do not count towards `limit`.
    pub fn awaiting_payment_page(
        &self,
        cursor: Option<&str>,
        created_since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> InboxDbResult<AwaitingPage> {
        let read_txn = self.db.begin_read()?;
        let pending = read_txn.open_table(PENDING_PAYMENTS)?;
        let requests = read_txn.open_table(REQUESTS)?;

        let lower = match cursor {
            Some(after) => Bound::Excluded(after),
            None => Bound::Unbounded,
        };

        let mut page = AwaitingPage::default();
        let mut last_seen: Option<String> = None;
        for entry in pending.range::<&str>((lower, Bound::Unbounded))? {
            let (id, _) = entry?;
            if page.requests.len() >= limit {
                page.next_cursor = last_seen;
                return Ok(page);
            }

            let id = id.value().to_string();
            if let Some(value) = requests.get(id.as_str())? {
                let request: StoredRequest = serde_json::from_slice(value.value())?;
                if created_since.is_some_and(|since| request.created_at < since) {
                    page.skipped_stale += 1;
                } else {
                    page.requests.push(request);
                }
            }
            last_seen = Some(id);
        }
        Ok(page)
    }

    /// Awaiting rows created at or after `awaiting_since` (all when `None`)
    /// plus paid rows not yet notified.
    pub fn count_open(&self, awaiting_since: Option<DateTime<Utc>>) -> InboxDbResult<usize> {
        let read_txn = self.db.begin_read()?;
        let since = awaiting_since.map(|t| t.timestamp());

        let mut open = 0;
        for entry in read_txn.open_table(PENDING_PAYMENTS)?.iter()? {
            let (_, created) = entry?;
            if since.map_or(true, |since| created.value() >= since) {
                open += 1;
            }
        }
        for entry in read_txn.open_table(UNNOTIFIED)?.iter()? {
            entry?;
            open += 1;
        }
        Ok(open)
    }

    /// `paid` requests not yet notified, oldest payment first.
    pub fn list_unnotified_paid(&self, limit: usize) -> InboxDbResult<Vec<StoredRequest>> {
        let mut rows = self.list_queue(UNNOTIFIED)?;
        rows.sort_by(|a, b| a.1.cmp(&b.1));
        self.load_rows(rows, limit)
    }

    fn list_queue(
        &self,
        queue: TableDefinition<'static, &'static str, i64>,
    ) -> InboxDbResult<Vec<(String, i64)>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(queue)?;
        let mut rows = Vec::new();
        for entry in table.iter()? {
            let (id, ts) = entry?;
            rows.push((id.value().to_string(), ts.value()));
        }
        Ok(rows)
    }

    fn load_rows(&self, rows: Vec<(String, i64)>, limit: usize) -> InboxDbResult<Vec<StoredRequest>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(REQUESTS)?;
        let mut out = Vec::with_capacity(limit.min(rows.len()));
        for (id, _) in rows.into_iter().take(limit) {
            if let Some(value) = table.get(id.as_str())? {
                out.push(serde_json::from_slice(value.value())?);
            }
        }
        Ok(out)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Persist a newly decided request together with its idempotency record.
    ///
    /// When `idempotency_key` was already used the transaction is abandoned
    /// and the first writer's response bytes are returned instead.
    pub fn commit_creation(
        &self,
        idempotency_key: Option<&str>,
        request: &StoredRequest,
        response: &[u8],
    ) -> InboxDbResult<CreationCommit> {
        let id = request.id.to_string();
        let json = serde_json::to_vec(request)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut idem_table = write_txn.open_table(idempotency::IDEMPOTENCY)?;
            if let Some(key) = idempotency_key {
                let existing = idem_table.get(key)?.map(|v| v.value().to_vec());
                if let Some(bytes) = existing {
                    drop(idem_table);
                    write_txn.abort()?;
                    return Ok(CreationCommit::Replayed(bytes));
                }
                idem_table.insert(key, response)?;
            }

            let mut requests = write_txn.open_table(REQUESTS)?;
            requests.insert(id.as_str(), json.as_slice())?;

            if let Some(reference) = request.payment_reference.as_deref() {
                let mut refs = write_txn.open_table(PAYMENT_REFERENCES)?;
                if refs.get(reference)?.is_some() {
                    return Err(InboxDbError::DuplicateReference(reference.to_string()));
                }
                refs.insert(reference, id.as_str())?;
            }

            if request.status == RequestStatus::AwaitingPayment {
                let mut pending = write_txn.open_table(PENDING_PAYMENTS)?;
                pending.insert(id.as_str(), request.created_at.timestamp())?;
            }
        }
        write_txn.commit()?;
        Ok(CreationCommit::Created)
    }

    /// `awaiting_payment → paid`, guarded on the stored status.
    ///
    /// A row that is already paid yields [`Transition::AlreadyDone`] and is
    /// left untouched, whatever signature the caller presented.
    pub fn transition_to_paid(
        &self,
        id: &Uuid,
        tx_sig: &str,
        paid_at: DateTime<Utc>,
    ) -> InboxDbResult<Transition> {
        let key = id.to_string();

        let write_txn = self.db.begin_write()?;
        let updated = {
            let mut requests = write_txn.open_table(REQUESTS)?;
            let mut request = read_row(&requests, &key)?;

            if request.status.is_paid() {
                drop(requests);
                write_txn.abort()?;
                return Ok(Transition::AlreadyDone(request));
            }

            let mut signatures = write_txn.open_table(PAID_SIGNATURES)?;
            let bound_to = signatures.get(tx_sig)?.map(|v| v.value().to_string());
            if let Some(other) = bound_to {
                return Err(InboxDbError::SignatureAlreadyUsed {
                    tx_sig: tx_sig.to_string(),
                    request_id: other,
                });
            }

            request.mark_paid(tx_sig, paid_at)?;
            let json = serde_json::to_vec(&request)?;
            requests.insert(key.as_str(), json.as_slice())?;
            signatures.insert(tx_sig, key.as_str())?;

            let mut pending = write_txn.open_table(PENDING_PAYMENTS)?;
            pending.remove(key.as_str())?;
            let mut unnotified = write_txn.open_table(UNNOTIFIED)?;
            unnotified.insert(key.as_str(), paid_at.timestamp())?;

            request
        };
        write_txn.commit()?;
        Ok(Transition::Applied(updated))
    }

    /// `paid → paid_notified`, guarded on the stored status.
    pub fn mark_notified(&self, id: &Uuid, at: DateTime<Utc>) -> InboxDbResult<Transition> {
        let key = id.to_string();

        let write_txn = self.db.begin_write()?;
        let updated = {
            let mut requests = write_txn.open_table(REQUESTS)?;
            let mut request = read_row(&requests, &key)?;

            if request.status == RequestStatus::PaidNotified {
                drop(requests);
                write_txn.abort()?;
                return Ok(Transition::AlreadyDone(request));
            }

            request.mark_notified(at)?;
            let json = serde_json::to_vec(&request)?;
            requests.insert(key.as_str(), json.as_slice())?;

            let mut unnotified = write_txn.open_table(UNNOTIFIED)?;
            unnotified.remove(key.as_str())?;

            request
        };
        write_txn.commit()?;
        Ok(Transition::Applied(updated))
    }
}

fn read_row(
    table: &redb::Table<'_, &'static str, &'static [u8]>,
    key: &str,
) -> InboxDbResult<StoredRequest> {
    let bytes = table
        .get(key)?
        .map(|v| v.value().to_vec())
        .ok_or_else(|| InboxDbError::NotFound(format!("Request {key}")))?;
    Ok(serde_json::from_slice(&bytes)?)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::requests::PaymentTerms;

    fn temp_db() -> (InboxDatabase, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = InboxDatabase::open(&dir.path().join("test.redb")).unwrap();
        (db, dir)
    }

    fn awaiting(reference: &str) -> StoredRequest {
        let mut req = StoredRequest::new("Outage".into(), "Help".into(), vec![], Some("40".into()));
        req.accept(PaymentTerms {
            quote_amount: "40".into(),
            quote_message: "Accepted".into(),
            asset_symbol: "USDC".into(),
            pay_to: "Recipient111".into(),
            reference: reference.into(),
            memo: format!("X:REQ:{}:REF:{reference}", req.id),
        })
        .unwrap();
        req
    }

    #[test]
    fn commit_and_get_request() {
        let (db, _dir) = temp_db();
        let req = awaiting("REF1");
        assert_eq!(db.commit_creation(None, &req, b"{}").unwrap(), CreationCommit::Created);

        let loaded = db.get_request(&req.id).unwrap().unwrap();
        assert_eq!(loaded, req);
        assert_eq!(db.request_id_for_reference("REF1").unwrap(), Some(req.id.to_string()));
        assert_eq!(db.list_awaiting_payment(10).unwrap().len(), 1);
    }

    #[test]
    fn missing_request_is_none() {
        let (db, _dir) = temp_db();
        assert!(db.get_request(&Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn idempotency_key_replays_first_response() {
        let (db, _dir) = temp_db();
        let first = awaiting("REF1");
        let second = awaiting("REF2");

        db.commit_creation(Some("k1"), &first, b"first").unwrap();
        let outcome = db.commit_creation(Some("k1"), &second, b"second").unwrap();

        assert_eq!(outcome, CreationCommit::Replayed(b"first".to_vec()));
        assert!(db.get_request(&second.id).unwrap().is_none());
        assert!(db.request_id_for_reference("REF2").unwrap().is_none());
    }

    #[test]
    fn duplicate_reference_is_refused() {
        let (db, _dir) = temp_db();
        db.commit_creation(None, &awaiting("REF1"), b"a").unwrap();
        let err = db.commit_creation(None, &awaiting("REF1"), b"b").unwrap_err();
        assert!(matches!(err, InboxDbError::DuplicateReference(_)));
    }

    #[test]
    fn paid_transition_happens_once() {
        let (db, _dir) = temp_db();
        let req = awaiting("REF1");
        db.commit_creation(None, &req, b"{}").unwrap();

        let first = db.transition_to_paid(&req.id, "SIG1", Utc::now()).unwrap();
        assert!(first.was_applied());
        assert_eq!(first.request().status, RequestStatus::Paid);

        let second = db.transition_to_paid(&req.id, "SIG2", Utc::now()).unwrap();
        assert!(!second.was_applied());
        assert_eq!(second.request().paid_tx_sig.as_deref(), Some("SIG1"));

        assert!(db.list_awaiting_payment(10).unwrap().is_empty());
        assert_eq!(db.list_unnotified_paid(10).unwrap().len(), 1);
        assert_eq!(db.request_id_for_signature("SIG1").unwrap(), Some(req.id.to_string()));
        assert!(db.request_id_for_signature("SIG2").unwrap().is_none());
    }

    #[test]
    fn signature_cannot_pay_two_requests() {
        let (db, _dir) = temp_db();
        let a = awaiting("REF1");
        let b = awaiting("REF2");
        db.commit_creation(None, &a, b"a").unwrap();
        db.commit_creation(None, &b, b"b").unwrap();

        db.transition_to_paid(&a.id, "SIG", Utc::now()).unwrap();
        let err = db.transition_to_paid(&b.id, "SIG", Utc::now()).unwrap_err();
        assert!(matches!(err, InboxDbError::SignatureAlreadyUsed { .. }));
        assert_eq!(
            db.get_request(&b.id).unwrap().unwrap().status,
            RequestStatus::AwaitingPayment
        );
    }

    #[test]
    fn rejected_request_cannot_be_paid() {
        let (db, _dir) = temp_db();
        let mut req = StoredRequest::new("t".into(), "b".into(), vec![], None);
        req.reject("no".into()).unwrap();
        db.commit_creation(None, &req, b"{}").unwrap();

        let err = db.transition_to_paid(&req.id, "SIG", Utc::now()).unwrap_err();
        assert!(matches!(err, InboxDbError::InvalidTransition(_)));
        assert!(db.list_awaiting_payment(10).unwrap().is_empty());
    }

    #[test]
    fn transition_on_unknown_request_is_not_found() {
        let (db, _dir) = temp_db();
        let err = db.transition_to_paid(&Uuid::new_v4(), "SIG", Utc::now()).unwrap_err();
        assert!(matches!(err, InboxDbError::NotFound(_)));
    }

    #[test]
    fn notified_only_after_paid() {
        let (db, _dir) = temp_db();
        let req = awaiting("REF1");
        db.commit_creation(None, &req, b"{}").unwrap();

        let err = db.mark_notified(&req.id, Utc::now()).unwrap_err();
        assert!(matches!(err, InboxDbError::InvalidTransition(_)));

        db.transition_to_paid(&req.id, "SIG", Utc::now()).unwrap();
        assert!(db.mark_notified(&req.id, Utc::now()).unwrap().was_applied());
        assert!(!db.mark_notified(&req.id, Utc::now()).unwrap().was_applied());
        assert!(db.list_unnotified_paid(10).unwrap().is_empty());

        let stored = db.get_request(&req.id).unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::PaidNotified);
        assert!(stored.notified_at.is_some());
    }

    #[test]
    fn listings_respect_limit() {
        let (db, _dir) = temp_db();
        for i in 0..5 {
            db.commit_creation(None, &awaiting(&format!("REF{i}")), b"{}").unwrap();
        }
        assert_eq!(db.list_awaiting_payment(3).unwrap().len(), 3);
    }

    #[test]
    fn awaiting_pages_cover_the_whole_queue() {
        let (db, _dir) = temp_db();
        for i in 0..5 {
            db.commit_creation(None, &awaiting(&format!("REF{i}")), b"{}").unwrap();
        }

        let first = db.awaiting_payment_page(None, None, 2).unwrap();
        assert_eq!(first.requests.len(), 2);
        let second = db.awaiting_payment_page(first.next_cursor.as_deref(), None, 2).unwrap();
        assert_eq!(second.requests.len(), 2);
        let third = db.awaiting_payment_page(second.next_cursor.as_deref(), None, 2).unwrap();
        assert_eq!(third.requests.len(), 1);
        assert!(third.next_cursor.is_none());

        let mut seen: Vec<Uuid> = [first, second, third]
            .into_iter()
            .flat_map(|page| page.requests.into_iter().map(|r| r.id))
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 5);
    }

    #[test]
    fn stale_rows_do_not_fill_the_page() {
        let (db, _dir) = temp_db();
        let mut old = awaiting("REF-OLD");
        old.created_at = Utc::now() - chrono::Duration::days(3);
        db.commit_creation(None, &old, b"{}").unwrap();
        let fresh = awaiting("REF-NEW");
        db.commit_creation(None, &fresh, b"{}").unwrap();

        let cutoff = Utc::now() - chrono::Duration::days(1);
        let mut cursor = None;
        let mut fresh_ids = Vec::new();
        let mut skipped = 0;
        loop {
            let page = db.awaiting_payment_page(cursor.as_deref(), Some(cutoff), 1).unwrap();
            assert!(page.requests.len() <= 1);
            skipped += page.skipped_stale;
            fresh_ids.extend(page.requests.into_iter().map(|r| r.id));
            cursor = page.next_cursor;
            if cursor.is_none() {
                break;
            }
        }
        assert_eq!(skipped, 1);
        assert_eq!(fresh_ids, vec![fresh.id]);
    }

    #[test]
    fn open_count_tracks_awaiting_and_unnotified() {
        let (db, _dir) = temp_db();
        let a = awaiting("REF1");
        let b = awaiting("REF2");
        db.commit_creation(None, &a, b"{}").unwrap();
        db.commit_creation(None, &b, b"{}").unwrap();
        assert_eq!(db.count_open(None).unwrap(), 2);

        db.transition_to_paid(&a.id, "SIG", Utc::now()).unwrap();
        assert_eq!(db.count_open(None).unwrap(), 2);

        db.mark_notified(&a.id, Utc::now()).unwrap();
        assert_eq!(db.count_open(None).unwrap(), 1);

        let future = Utc::now() + chrono::Duration::hours(1);
        assert_eq!(db.count_open(Some(future)).unwrap(), 0);
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inbox.redb");
        let req = awaiting("REF1");
        {
            let db = InboxDatabase::open(&path).unwrap();
            db.commit_creation(Some("k"), &req, b"resp").unwrap();
        }
        let db = InboxDatabase::open(&path).unwrap();
        assert!(db.get_request(&req.id).unwrap().is_some());
        assert_eq!(db.get_idempotent_response("k").unwrap(), Some(b"resp".to_vec()));
    }
}
