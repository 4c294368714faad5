// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Payment Poller
//!
//! Background task that periodically scans for payments of requests still in
//! `awaiting_payment`, so a payer who never calls confirm still gets their
//! request marked paid (and the provider notified).
//!
//! ## Strategy
//!
//! Every `poll_interval` the poller:
//! 1. Reads the next page of awaiting requests, resuming where the previous
//!    sweep stopped and wrapping to the start once the queue end is reached.
//!    A backlog larger than one page is therefore covered over several sweeps.
//! 2. Skips requests older than `max_age`; unpaid intents that old are
//!    abandoned and not worth the RPC traffic. Skipped rows do not use up
//!    page slots.
//! 3. Runs the ledger's scan for each remaining request. The scan goes through
//!    the same guarded transition as client confirmation, so a request paid
//!    concurrently by a client call is never notified twice.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::inbox::{RequestLedger, ScanResult};

/// Awaiting requests examined per sweep.
const SWEEP_BATCH: usize = 100;

/// Result of one sweep, for logging and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub scanned: usize,
    pub paid: usize,
    pub skipped_stale: usize,
    pub failed: usize,
}

pub struct PaymentPoller {
    ledger: Arc<RequestLedger>,
    poll_interval: Duration,
    max_age: Duration,
    /// Last request id of the previous page; `None` starts from the front.
    cursor: Option<String>,
}

impl PaymentPoller {
    pub fn new(ledger: Arc<RequestLedger>, poll_interval: Duration, max_age: Duration) -> Self {
        Self {
            ledger,
            poll_interval,
            max_age,
            cursor: None,
        }
    }

    /// Run the poller loop until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(poller.run(shutdown.clone()));
    /// ```
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.poll_interval.as_secs(),
            max_age_secs = self.max_age.as_secs(),
            "Payment poller starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Payment poller shutting down");
                return;
            }

            let stats = self.poll_step().await;
            if stats.scanned > 0 {
                info!(
                    scanned = stats.scanned,
                    paid = stats.paid,
                    skipped_stale = stats.skipped_stale,
                    failed = stats.failed,
                    "Payment poller: sweep finished"
                );
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Payment poller shutting down");
                    return;
                }
            }
        }
    }

    /// One sweep over the next page of awaiting requests.
    pub async fn poll_step(&mut self) -> SweepStats {
        let mut stats = SweepStats::default();

        let cutoff = chrono::Duration::from_std(self.max_age)
            .ok()
            .map(|age| Utc::now() - age);

        let page = match self
            .ledger
            .awaiting_payment_page(self.cursor.as_deref(), cutoff, SWEEP_BATCH)
        {
            Ok(page) => page,
            Err(e) => {
                warn!(error = %e, "Payment poller: failed to list awaiting requests");
                return stats;
            }
        };
        self.cursor = page.next_cursor;
        stats.skipped_stale = page.skipped_stale;

        for request in page.requests {
            stats.scanned += 1;
            match self.ledger.scan_for_payment(&request.id).await {
                Ok(ScanResult::Paid(confirmation)) => {
                    if confirmation.newly_paid {
                        stats.paid += 1;
                        info!(
                            request_id = %request.id,
                            tx_sig = %confirmation.tx_sig,
                            "Payment poller: request paid"
                        );
                    }
                }
                Ok(ScanResult::NotFound(outcome)) => {
                    debug!(
                        request_id = %request.id,
                        checked = outcome.checked,
                        "Payment poller: no payment yet"
                    );
                }
                Err(e) => {
                    stats.failed += 1;
                    warn!(
                        request_id = %request.id,
                        error = %e,
                        "Payment poller: scan failed"
                    );
                }
            }
        }

        stats
    }
}
