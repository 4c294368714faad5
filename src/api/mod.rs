// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::HeaderName,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{
        AvailabilityInfo, ConfirmPaymentBody, CreateRequestBody, CreateRequestResponse,
        CreateStatus, DiscoveryResponse, EndpointInfo, LimitsInfo, NotificationResults,
        OperatorRequestView, PaymentCapabilities, PaymentConfirmedResponse, PaymentIntentView,
        PaymentRequiredResponse, ProviderInfo, RequestListResponse, RequestSnapshot,
        ScanMissResponse, TestNotificationBody, TierInfo,
    },
    notify::NotifyOutcome,
    payment::{Asset, MatchedTransfer, ScanMissReason, VerificationReason, VerificationResult},
    state::AppState,
    storage::RequestStatus,
};

pub mod discovery;
pub mod health;
pub mod operator;
pub mod requests;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/requests", post(requests::create_request))
        .route("/requests/{id}", get(requests::get_request))
        .route("/requests/{id}/confirm", post(requests::confirm_payment))
        .route("/requests/{id}/scan", post(requests::scan_payment))
        .route("/operator/unnotified", get(operator::list_unnotified))
        .route("/operator/awaiting", get(operator::list_awaiting))
        .route(
            "/operator/requests/{id}/notified",
            post(operator::mark_notified),
        )
        .route("/operator/notify/test", post(operator::test_notification));

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/.well-known/escalatex", get(discovery::well_known))
        .nest("/v1", v1_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Escalation Inbox",
        description = "Payment-bound request intake with on-chain USDC verification."
    ),
    paths(
        health::health,
        health::liveness,
        health::readiness,
        discovery::well_known,
        requests::create_request,
        requests::get_request,
        requests::confirm_payment,
        requests::scan_payment,
        operator::list_unnotified,
        operator::list_awaiting,
        operator::mark_notified,
        operator::test_notification
    ),
    components(
        schemas(
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            DiscoveryResponse,
            ProviderInfo,
            PaymentCapabilities,
            AvailabilityInfo,
            TierInfo,
            LimitsInfo,
            EndpointInfo,
            CreateRequestBody,
            CreateRequestResponse,
            CreateStatus,
            RequestSnapshot,
            RequestStatus,
            PaymentIntentView,
            PaymentRequiredResponse,
            ConfirmPaymentBody,
            PaymentConfirmedResponse,
            ScanMissResponse,
            ScanMissReason,
            VerificationResult,
            VerificationReason,
            MatchedTransfer,
            NotifyOutcome,
            Asset,
            RequestListResponse,
            OperatorRequestView,
            TestNotificationBody,
            NotificationResults
        )
    ),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Discovery", description = "Machine-readable provider capabilities"),
        (name = "Requests", description = "Request intake and status"),
        (name = "Payments", description = "On-chain payment confirmation"),
        (name = "Operator", description = "Operator queue (Authorization: Bearer OPERATOR_TOKEN)")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::TestState;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let t = TestState::new();
        let app = router(t.state.clone());
        let _ = app.into_make_service();
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let t = TestState::new();
        let app = router(t.state.clone());

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/health/live").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health/live")
                    .header(REQUEST_ID_HEADER, "trace-me")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "trace-me");
    }

    #[test]
    fn openapi_lists_public_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/v1/requests"));
        assert!(doc.paths.paths.contains_key("/v1/requests/{id}/confirm"));
        assert!(doc.paths.paths.contains_key("/.well-known/escalatex"));
    }
}
