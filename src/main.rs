// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use escalation_inbox::{
    api::router,
    config::AppConfig,
    logging::{init_tracing, LogFormat},
    notify::{telegram::TelegramNotifier, NotifierSet},
    payment::{CachedLedgerClient, SolanaRpcClient},
    payment_poller::PaymentPoller,
    state::AppState,
    storage::InboxDatabase,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Cached ledger transactions.
const TX_CACHE_CAPACITY: usize = 2048;
const TX_CACHE_TTL: Duration = Duration::from_secs(300);

/// In-flight requests get this long to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = init_tracing(LogFormat::from_env()) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Escalation inbox failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), BoxError> {
    let config = AppConfig::from_env()?;
    let bind_addr = config.bind_addr;
    let tls = config.tls.clone();
    let poll_interval = config.poll_interval;
    let poll_max_age = config.poll_max_age;

    std::fs::create_dir_all(&config.data_dir)?;
    let db = Arc::new(InboxDatabase::open(&config.database_path())?);
    info!(path = %config.database_path().display(), "Request database opened");

    let rpc = SolanaRpcClient::new(&config.rpc_url)?;
    let ledger_client = Arc::new(CachedLedgerClient::new(
        Arc::new(rpc),
        TX_CACHE_CAPACITY,
        TX_CACHE_TTL,
    ));

    let mut notifiers = NotifierSet::new();
    match &config.telegram {
        Some(telegram) => notifiers = notifiers.with(Arc::new(TelegramNotifier::new(telegram)?)),
        None => warn!("No notifier configured; paid requests stay in the unnotified queue"),
    }
    if config.operator_token.is_none() {
        warn!("OPERATOR_TOKEN not set; operator endpoints are disabled");
    }

    info!(
        recipient = %config.pay_to,
        asset = %config.asset.symbol,
        min_quote = %config.min_quote,
        "Payment settings loaded"
    );

    let state = AppState::build(config, db, ledger_client, notifiers);

    let shutdown = CancellationToken::new();
    let handle = Handle::new();
    {
        let shutdown = shutdown.clone();
        let handle = handle.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            info!("Shutdown signal received");
            shutdown.cancel();
            handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        });
    }

    match poll_interval {
        Some(interval) => {
            let poller = PaymentPoller::new(state.ledger.clone(), interval, poll_max_age);
            tokio::spawn(poller.run(shutdown.clone()));
        }
        None => info!("Payment poller disabled"),
    }

    let app = router(state);

    match tls {
        Some(paths) => {
            if rustls::crypto::ring::default_provider()
                .install_default()
                .is_err()
            {
                warn!("rustls crypto provider was already installed");
            }
            let tls_config = RustlsConfig::from_pem_file(&paths.cert, &paths.key).await?;
            info!(addr = %bind_addr, "Escalation inbox listening on https (docs at /docs)");
            axum_server::bind_rustls(bind_addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            info!(addr = %bind_addr, "Escalation inbox listening on http (docs at /docs)");
            axum_server::bind(bind_addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
    }

    shutdown.cancel();
    info!("Escalation inbox stopped");
    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
