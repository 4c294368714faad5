// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};

use crate::models::{
    AvailabilityInfo, DiscoveryResponse, EndpointInfo, LimitsInfo, PaymentCapabilities,
    ProviderInfo, TierInfo,
};
use crate::payment::SOLANA_MAINNET;
use crate::state::AppState;

pub const PROTOCOL_VERSION: &str = "escalatex/0.1";

/// Machine-readable capabilities document.
#[utoipa::path(
    get,
    path = "/.well-known/escalatex",
    tag = "Discovery",
    responses(
        (status = 200, description = "Provider capabilities", body = DiscoveryResponse)
    )
)]
pub async fn well_known(State(state): State<AppState>) -> Json<DiscoveryResponse> {
    let config = &state.config;

    Json(DiscoveryResponse {
        protocol: PROTOCOL_VERSION.to_string(),
        provider: ProviderInfo {
            handle: config.provider_handle.clone(),
            display_name: config.provider_display_name.clone(),
        },
        payment: PaymentCapabilities {
            network: SOLANA_MAINNET.network_id.to_string(),
            asset: config.asset.symbol.clone(),
            mint: config.asset.mint.clone(),
            decimals: config.asset.decimals,
            recipient: config.pay_to.clone(),
            memo_namespace: config.memo_namespace.clone(),
            min_quote_usd: config.min_quote.clone(),
        },
        availability: AvailabilityInfo {
            timezone: "UTC".to_string(),
            start_hour: state.hours.start,
            end_hour: state.hours.end,
            available_now: state.hours.is_open_now(),
        },
        tiers: config.tiers.iter().map(TierInfo::from).collect(),
        limits: LimitsInfo {
            max_open_requests: config.max_open_requests,
        },
        endpoints: EndpointInfo {
            create_request: "POST /v1/requests".to_string(),
            get_request: "GET /v1/requests/{id}".to_string(),
            confirm_payment: "POST /v1/requests/{id}/confirm".to_string(),
            scan_payment: "POST /v1/requests/{id}/scan".to_string(),
        },
    })
}
