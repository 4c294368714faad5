// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Outbound provider notifications.
//!
//! Delivery is best-effort: every configured notifier is tried once, failures
//! are reported back to the caller and logged, never retried here. Requests
//! whose notification failed stay `paid` and show up in the operator's
//! unnotified listing.

pub mod telegram;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

pub use telegram::TelegramNotifier;

/// A request has been paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaidNotice {
    pub request_id: Uuid,
    pub title: String,
    pub quote_amount: Option<String>,
    pub asset_symbol: String,
    pub tx_sig: String,
    pub receipt_url: Option<String>,
}

/// Events a notifier can be told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyEvent {
    Paid(PaidNotice),
    /// Free-form operator message (connectivity checks).
    Test(String),
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport error: {0}")]
    Transport(String),

    #[error("notification rejected ({status}): {description}")]
    Rejected { status: u16, description: String },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short identifier used in logs and results.
    fn name(&self) -> &'static str;

    async fn notify(&self, event: &NotifyEvent) -> Result<(), NotifyError>;
}

/// Per-notifier delivery result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NotifyOutcome {
    pub notifier: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Fan-out over all configured notifiers.
#[derive(Clone, Default)]
pub struct NotifierSet {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl NotifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    /// Deliver `event` to every notifier in order, collecting results.
    pub async fn notify_all(&self, event: &NotifyEvent) -> Vec<NotifyOutcome> {
        let mut outcomes = Vec::with_capacity(self.notifiers.len());
        for notifier in &self.notifiers {
            let outcome = match notifier.notify(event).await {
                Ok(()) => {
                    info!(notifier = notifier.name(), "Notification delivered");
                    NotifyOutcome {
                        notifier: notifier.name().to_string(),
                        ok: true,
                        error: None,
                    }
                }
                Err(e) => {
                    warn!(notifier = notifier.name(), error = %e, "Notification failed");
                    NotifyOutcome {
                        notifier: notifier.name().to_string(),
                        ok: false,
                        error: Some(e.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}

/// Records events; optionally fails every delivery.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    pub events: std::sync::Mutex<Vec<NotifyEvent>>,
    pub fail: bool,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

#[cfg(test)]
#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn notify(&self, event: &NotifyEvent) -> Result<(), NotifyError> {
        self.events.lock().unwrap().push(event.clone());
        if self.fail {
            Err(NotifyError::Transport("unreachable".into()))
        } else {
            Ok(())
        }
    }
}
