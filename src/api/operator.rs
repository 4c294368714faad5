// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Operator endpoints (bearer `OPERATOR_TOKEN`).

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::requests::parse_request_id;
use crate::auth::Operator;
use crate::error::ApiError;
use crate::models::{
    ListQuery, NotificationResults, OperatorRequestView, RequestListResponse, RequestSnapshot,
    TestNotificationBody,
};
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: usize = 50;
const MAX_LIST_LIMIT: usize = 500;

fn list_limit(query: &ListQuery) -> usize {
    query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT)
}

/// Paid requests whose notification was never delivered, oldest first.
#[utoipa::path(
    get,
    path = "/v1/operator/unnotified",
    tag = "Operator",
    params(("limit" = Option<usize>, Query, description = "Maximum rows (default 50, max 500)")),
    responses(
        (status = 200, description = "Unnotified paid requests", body = RequestListResponse),
        (status = 401, description = "Missing or wrong operator token"),
        (status = 503, description = "Operator endpoints not configured")
    )
)]
pub async fn list_unnotified(
    _: Operator,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<RequestListResponse>, ApiError> {
    let rows = state.ledger.list_unnotified_paid(list_limit(&query))?;
    Ok(Json(RequestListResponse {
        requests: rows.iter().map(OperatorRequestView::from).collect(),
    }))
}

/// Requests awaiting payment, newest first.
#[utoipa::path(
    get,
    path = "/v1/operator/awaiting",
    tag = "Operator",
    params(("limit" = Option<usize>, Query, description = "Maximum rows (default 50, max 500)")),
    responses(
        (status = 200, description = "Requests awaiting payment", body = RequestListResponse),
        (status = 401, description = "Missing or wrong operator token"),
        (status = 503, description = "Operator endpoints not configured")
    )
)]
pub async fn list_awaiting(
    _: Operator,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<RequestListResponse>, ApiError> {
    let rows = state.ledger.list_awaiting_payment(list_limit(&query))?;
    Ok(Json(RequestListResponse {
        requests: rows.iter().map(OperatorRequestView::from).collect(),
    }))
}

/// Acknowledge a paid request out of band (`paid → paid_notified`).
#[utoipa::path(
    post,
    path = "/v1/operator/requests/{id}/notified",
    tag = "Operator",
    params(("id" = String, Path, description = "Request id (UUID)")),
    responses(
        (status = 200, description = "Request marked notified", body = RequestSnapshot),
        (status = 404, description = "Unknown request"),
        (status = 409, description = "Request is not paid")
    )
)]
pub async fn mark_notified(
    _: Operator,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RequestSnapshot>, ApiError> {
    let id = parse_request_id(&id)?;
    let request = state.ledger.mark_notified(&id)?;
    Ok(Json(RequestSnapshot::from(&request)))
}

/// Send a test message through every notifier.
#[utoipa::path(
    post,
    path = "/v1/operator/notify/test",
    tag = "Operator",
    request_body = TestNotificationBody,
    responses(
        (status = 200, description = "Delivery results", body = NotificationResults)
    )
)]
pub async fn test_notification(
    _: Operator,
    State(state): State<AppState>,
    Json(body): Json<TestNotificationBody>,
) -> Json<NotificationResults> {
    let text = body
        .message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| "Escalatex402: test notification".to_string());

    let notifications = state.ledger.send_test_notification(text).await;
    Json(NotificationResults {
        delivered: notifications.iter().any(|n| n.ok),
        notifications,
    })
}

#[cfg(test)]
mod tests {
    use crate::api::router;
    use crate::notify::NotifyEvent;
    use crate::state::testing::TestState;
    use crate::storage::RequestStatus;
    use axum::{
        body::{to_bytes, Body},
        http::{header::AUTHORIZATION, Request, StatusCode},
        Router,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    const TOKEN: &str = "op-secret";

    async fn call(app: &Router, method: &str, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = if method == "POST" { Body::from("{}") } else { Body::empty() };
        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    /// One request moved to `paid` directly in the store, never notified.
    fn paid_unnotified(t: &TestState) -> uuid::Uuid {
        let ledger = &t.state.ledger;
        let outcome = ledger
            .create_request(
                None,
                crate::models::CreateRequestBody {
                    title: "Outage".into(),
                    body: "Help".into(),
                    tags: vec![],
                    budget_usd: None,
                    desired_tier: None,
                },
            )
            .unwrap();
        let created: crate::models::CreateRequestResponse =
            serde_json::from_slice(&outcome.body).unwrap();
        let id = created.request.id;
        ledger.database().transition_to_paid(&id, "PaySig1", chrono::Utc::now()).unwrap();
        id
    }

    #[tokio::test]
    async fn routes_are_off_without_token() {
        let t = TestState::new();
        let app = router(t.state.clone());
        let (status, body) = call(&app, "GET", "/v1/operator/unnotified", Some(TOKEN)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error_code"], "operator_disabled");
    }

    #[tokio::test]
    async fn wrong_token_is_401() {
        let t = TestState::with_operator_token(TOKEN);
        let app = router(t.state.clone());
        let (status, _) = call(&app, "GET", "/v1/operator/unnotified", Some("nope")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = call(&app, "GET", "/v1/operator/unnotified", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unnotified_listing_and_acknowledgement() {
        let t = TestState::with_operator_token(TOKEN);
        let app = router(t.state.clone());
        let id = paid_unnotified(&t);

        let (status, body) = call(&app, "GET", "/v1/operator/unnotified", Some(TOKEN)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["requests"].as_array().unwrap().len(), 1);
        assert_eq!(body["requests"][0]["request"]["id"], id.to_string());
        assert_eq!(body["requests"][0]["request"]["paid_tx_sig"], "PaySig1");

        let uri = format!("/v1/operator/requests/{id}/notified");
        let (status, body) = call(&app, "POST", &uri, Some(TOKEN)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "paid_notified");

        let (_, body) = call(&app, "GET", "/v1/operator/unnotified", Some(TOKEN)).await;
        assert!(body["requests"].as_array().unwrap().is_empty());

        // Acknowledging twice is harmless.
        let (status, _) = call(&app, "POST", &uri, Some(TOKEN)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            t.state.ledger.get_request(&id).unwrap().status,
            RequestStatus::PaidNotified
        );
    }

    #[tokio::test]
    async fn awaiting_request_cannot_be_acknowledged() {
        let t = TestState::with_operator_token(TOKEN);
        let app = router(t.state.clone());
        let outcome = t
            .state
            .ledger
            .create_request(
                None,
                crate::models::CreateRequestBody {
                    title: "Outage".into(),
                    body: "Help".into(),
                    tags: vec![],
                    budget_usd: None,
                    desired_tier: None,
                },
            )
            .unwrap();
        let created: crate::models::CreateRequestResponse =
            serde_json::from_slice(&outcome.body).unwrap();

        let (status, body) = call(&app, "GET", "/v1/operator/awaiting", Some(TOKEN)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["requests"].as_array().unwrap().len(), 1);

        let uri = format!("/v1/operator/requests/{}/notified", created.request.id);
        let (status, _) = call(&app, "POST", &uri, Some(TOKEN)).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_notification_reaches_notifiers() {
        let t = TestState::with_operator_token(TOKEN);
        let app = router(t.state.clone());

        let (status, body) = call(&app, "POST", "/v1/operator/notify/test", Some(TOKEN)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["delivered"], true);
        assert_eq!(t.notifier.count(), 1);
        let events = t.notifier.events.lock().unwrap();
        assert!(matches!(
            &events[0],
            NotifyEvent::Test(text) if text.contains("test notification")
        ));
    }
}
