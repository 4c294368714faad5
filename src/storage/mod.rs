// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Request Storage
//!
//! Persistent state lives in a single redb file under `DATA_DIR`:
//!
//! ```text
//! {DATA_DIR}/
//!   inbox.redb    # requests, unique indexes, work queues, idempotency
//! ```
//!
//! Requests are never deleted. Payment references and paid signatures are
//! unique indexes; the store refuses to bind either one twice.

pub mod database;
pub mod idempotency;
pub mod requests;

pub use database::{AwaitingPage, CreationCommit, InboxDatabase, InboxDbError, InboxDbResult, Transition};
pub use requests::{InvalidTransition, PaymentTerms, RequestStatus, StoredRequest};

/// File name of the database inside the data directory.
pub const DATABASE_FILE: &str = "inbox.redb";
