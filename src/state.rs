// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::OperatorToken;
use crate::config::AppConfig;
use crate::inbox::{KeywordPolicy, LedgerSettings, RequestLedger, WorkingHours};
use crate::notify::NotifierSet;
use crate::payment::{LedgerClient, PaymentIntentBuilder, SOLANA_MAINNET};
use crate::storage::InboxDatabase;

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<RequestLedger>,
    pub config: Arc<AppConfig>,
    pub hours: WorkingHours,
    /// `None` disables the operator routes.
    pub operator: Option<OperatorToken>,
}

impl AppState {
    pub fn new(ledger: Arc<RequestLedger>, config: AppConfig) -> Self {
        Self {
            ledger,
            hours: WorkingHours::new(config.working_hours_start, config.working_hours_end),
            operator: config.operator_token.as_deref().and_then(OperatorToken::new),
            config: Arc::new(config),
        }
    }

    /// Wire the ledger from configuration and injected handles.
    pub fn build(
        config: AppConfig,
        db: Arc<InboxDatabase>,
        ledger_client: Arc<dyn LedgerClient>,
        notifiers: NotifierSet,
    ) -> Self {
        let intents = PaymentIntentBuilder::new(config.memo_namespace.clone())
            .with_label(config.provider_display_name.clone());
        let policy = KeywordPolicy::new(&config.min_quote, config.asset.decimals);

        let ledger = RequestLedger::new(
            db,
            ledger_client,
            intents,
            Arc::new(policy),
            notifiers,
            LedgerSettings {
                pay_to: config.pay_to.clone(),
                asset: config.asset.clone(),
                intent_ttl: config.intent_ttl,
                scan_limit: config.scan_limit,
                explorer_url: Some(SOLANA_MAINNET.explorer_url.to_string()),
                tiers: config.tiers.clone(),
                max_open_requests: config.max_open_requests,
            },
        );

        Self::new(Arc::new(ledger), config)
    }
}
