// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Idempotency records: key → exact response bytes.
//!
//! A record is written at most once per key and never modified. Request
//! creation writes its record in the same transaction as the row (see
//! [`InboxDatabase::commit_creation`]); the standalone operations here serve
//! lookups and callers that have no row to commit.

use redb::{ReadableDatabase, ReadableTable, TableDefinition};

use super::database::{InboxDatabase, InboxDbResult};

/// Idempotency key → response bytes.
pub(super) const IDEMPOTENCY: TableDefinition<&str, &[u8]> = TableDefinition::new("idempotency");

impl InboxDatabase {
    /// Response recorded for `key`, if any.
    pub fn get_idempotent_response(&self, key: &str) -> InboxDbResult<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(IDEMPOTENCY)?;
        Ok(table.get(key)?.map(|v| v.value().to_vec()))
    }

    /// Record `response` under `key` unless a record exists.
    ///
    /// Returns the bytes that are stored after the call: `response` when this
    /// call wrote them, otherwise the earlier record.
    pub fn put_idempotent_response_if_absent(
        &self,
        key: &str,
        response: &[u8],
    ) -> InboxDbResult<Vec<u8>> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(IDEMPOTENCY)?;
            let existing = table.get(key)?.map(|v| v.value().to_vec());
            if let Some(bytes) = existing {
                drop(table);
                write_txn.abort()?;
                return Ok(bytes);
            }
            table.insert(key, response)?;
        }
        write_txn.commit()?;
        Ok(response.to_vec())
    }
}
