//! Payment-processor webhook receiver.
//!
//! The endpoint verifies the delivery signature, acknowledges immediately,
//! and reconciles the database in a detached task. A delivery the processor
//! sees acknowledged can therefore still fail downstream; those failures are
//! logged and never retried.

use secrecy::ExposeSecret;

use super::common::*;
use crate::infra::stripe_client::StripeClient;

/// POST /api/billing/webhook
async fn handle_webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> AppResult<impl IntoResponse> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::InvalidInput(
            "Missing stripe-signature header".into(),
        ))?;

    StripeClient::verify_webhook_signature(
        &body,
        signature,
        app_state.config.stripe_webhook_secret.expose_secret(),
    )?;

    let event: serde_json::Value = serde_json::from_str(&body)
        .map_err(|e| AppError::InvalidInput(format!("Invalid webhook payload: {e}")))?;

    // Acknowledge now; the processor only needs to know the delivery was
    // received. Reconciliation runs off the request path.
    let billing = app_state.billing_use_cases.clone();
    tokio::spawn(async move {
        let event_type = event["type"].as_str().unwrap_or("").to_string();
        if let Err(e) = billing.handle_webhook_event(event).await {
            error!(error = %e, event_type, "Webhook background processing failed");
        }
    });

    Ok(Json(serde_json::json!({ "received": true })))
}

// ============================================================================
// Router
// ============================================================================

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/billing/webhook", post(handle_webhook))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum_test::TestServer;
    use serde_json::json;

    use crate::test_utils::{
        TEST_WEBHOOK_SECRET, TestAppStateBuilder, checkout_completed_payment_event,
        checkout_completed_subscription_event, create_test_subscription, settle,
        sign_webhook_payload, subscription_updated_event, test_gateway_subscription,
    };

    fn build_test_server(app_state: AppState) -> TestServer {
        let router: Router = crate::adapters::http::routes::router().with_state(app_state);
        TestServer::new(router).unwrap()
    }

    async fn post_signed(server: &TestServer, event: &serde_json::Value) -> axum_test::TestResponse {
        let body = event.to_string();
        let signature = sign_webhook_payload(&body, TEST_WEBHOOK_SECRET);
        server
            .post("/billing/webhook")
            .add_header("stripe-signature", signature)
            .text(body)
            .await
    }

    // =========================================================================
    // Signature handling
    // =========================================================================

    #[tokio::test]
    async fn webhook_missing_signature_returns_400() {
        let builder = TestAppStateBuilder::new();
        let orders = builder.orders();
        let server = build_test_server(builder.build());

        let response = server.post("/billing/webhook").text("{}").await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "Missing stripe-signature header");
        assert_eq!(orders.count(), 0);
    }

    #[tokio::test]
    async fn webhook_invalid_signature_returns_400_and_writes_nothing() {
        let builder = TestAppStateBuilder::new();
        let orders = builder.orders();
        let subscriptions = builder.subscriptions();
        let server = build_test_server(builder.build());

        let event =
            checkout_completed_payment_event("cs_test_1", "cus_1", &Uuid::new_v4().to_string());
        let body = event.to_string();
        // Signed with the wrong secret.
        let signature = sign_webhook_payload(&body, "whsec_wrong");

        let response = server
            .post("/billing/webhook")
            .add_header("stripe-signature", signature)
            .text(body)
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        settle().await;
        assert_eq!(orders.count(), 0);
        assert_eq!(subscriptions.count(), 0);
    }

    #[tokio::test]
    async fn webhook_garbage_body_with_valid_signature_returns_400() {
        let server = build_test_server(TestAppStateBuilder::new().build());

        let body = "not json";
        let signature = sign_webhook_payload(body, TEST_WEBHOOK_SECRET);

        let response = server
            .post("/billing/webhook")
            .add_header("stripe-signature", signature)
            .text(body)
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    // =========================================================================
    // One-time payment completion
    // =========================================================================

    #[tokio::test]
    async fn payment_checkout_completion_records_one_order() {
        let builder = TestAppStateBuilder::new();
        let orders = builder.orders();
        let server = build_test_server(builder.build());

        let user_id = Uuid::new_v4();
        let event = checkout_completed_payment_event("cs_test_1", "cus_1", &user_id.to_string());

        let response = post_signed(&server, &event).await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["received"], true);

        settle().await;

        let recorded = orders.all();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].checkout_session_id, "cs_test_1");
        assert_eq!(recorded[0].user_id, user_id);
        assert_eq!(recorded[0].status.as_str(), "completed");
        assert_eq!(recorded[0].payment_status.as_deref(), Some("paid"));
    }

    #[tokio::test]
    async fn replayed_payment_event_does_not_duplicate_order() {
        let builder = TestAppStateBuilder::new();
        let orders = builder.orders();
        let server = build_test_server(builder.build());

        let event =
            checkout_completed_payment_event("cs_test_1", "cus_1", &Uuid::new_v4().to_string());

        post_signed(&server, &event).await.assert_status_ok();
        settle().await;
        // Same delivery again: acknowledged, but absorbed by the session-id
        // uniqueness.
        post_signed(&server, &event).await.assert_status_ok();
        settle().await;

        assert_eq!(orders.count(), 1);
    }

    #[tokio::test]
    async fn payment_event_without_user_metadata_records_nothing() {
        let builder = TestAppStateBuilder::new();
        let orders = builder.orders();
        let server = build_test_server(builder.build());

        let mut event =
            checkout_completed_payment_event("cs_test_1", "cus_1", &Uuid::new_v4().to_string());
        event["data"]["object"]["metadata"] = json!({});

        post_signed(&server, &event).await.assert_status_ok();
        settle().await;

        assert_eq!(orders.count(), 0);
    }

    #[tokio::test]
    async fn unpaid_payment_checkout_is_ignored() {
        let builder = TestAppStateBuilder::new();
        let orders = builder.orders();
        let server = build_test_server(builder.build());

        let mut event =
            checkout_completed_payment_event("cs_test_1", "cus_1", &Uuid::new_v4().to_string());
        event["data"]["object"]["payment_status"] = json!("unpaid");

        post_signed(&server, &event).await.assert_status_ok();
        settle().await;

        assert_eq!(orders.count(), 0);
    }

    // =========================================================================
    // Subscription sync
    // =========================================================================

    #[tokio::test]
    async fn subscription_checkout_completion_syncs_from_gateway() {
        let builder = TestAppStateBuilder::new();
        let subscriptions = builder.subscriptions();
        let gateway = builder.gateway();
        let server = build_test_server(builder.build());

        gateway.set_subscriptions(
            "cus_1",
            vec![test_gateway_subscription(|s| {
                s.id = "sub_1".to_string();
                s.status = "active".to_string();
                s.price_id = Some("price_monthly".to_string());
                s.payment_method_brand = Some("visa".to_string());
                s.payment_method_last4 = Some("4242".to_string());
            })],
        );

        let event = checkout_completed_subscription_event("cus_1");
        post_signed(&server, &event).await.assert_status_ok();
        settle().await;

        let mirror = subscriptions.get("cus_1").unwrap();
        assert_eq!(mirror.subscription_id.as_deref(), Some("sub_1"));
        assert_eq!(mirror.status, "active");
        assert_eq!(mirror.price_id.as_deref(), Some("price_monthly"));
        assert_eq!(mirror.payment_method_last4.as_deref(), Some("4242"));
    }

    #[tokio::test]
    async fn subscription_update_event_overwrites_mirror_row() {
        let builder = TestAppStateBuilder::new();
        let subscriptions = builder.subscriptions();
        let gateway = builder.gateway();
        let server = build_test_server(builder.build());

        subscriptions.seed(create_test_subscription("cus_1", |s| {
            s.status = "active".to_string();
        }));
        gateway.set_subscriptions(
            "cus_1",
            vec![test_gateway_subscription(|s| {
                s.status = "canceled".to_string();
                s.cancel_at_period_end = true;
            })],
        );

        let event = subscription_updated_event("cus_1");
        post_signed(&server, &event).await.assert_status_ok();
        settle().await;

        let mirror = subscriptions.get("cus_1").unwrap();
        assert_eq!(mirror.status, "canceled");
        assert!(mirror.cancel_at_period_end);
    }

    #[tokio::test]
    async fn empty_gateway_listing_resets_to_not_started() {
        let builder = TestAppStateBuilder::new();
        let subscriptions = builder.subscriptions();
        let server = build_test_server(builder.build());

        subscriptions.seed(create_test_subscription("cus_1", |s| {
            s.status = "active".to_string();
        }));
        // Gateway has no subscriptions for cus_1.

        let event = subscription_updated_event("cus_1");
        post_signed(&server, &event).await.assert_status_ok();
        settle().await;

        // Row survives, status resets.
        let mirror = subscriptions.get("cus_1").unwrap();
        assert_eq!(mirror.status, "not_started");
    }

    // =========================================================================
    // Skipped events
    // =========================================================================

    #[tokio::test]
    async fn event_without_customer_is_acknowledged_and_ignored() {
        let builder = TestAppStateBuilder::new();
        let orders = builder.orders();
        let subscriptions = builder.subscriptions();
        let server = build_test_server(builder.build());

        let event = json!({
            "id": "evt_1",
            "type": "product.updated",
            "data": { "object": { "id": "prod_1" } }
        });

        let response = post_signed(&server, &event).await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["received"], true);

        settle().await;
        assert_eq!(orders.count(), 0);
        assert_eq!(subscriptions.count(), 0);
    }

    #[tokio::test]
    async fn payment_intent_without_invoice_is_ignored() {
        let builder = TestAppStateBuilder::new();
        let subscriptions = builder.subscriptions();
        let server = build_test_server(builder.build());

        let event = json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "data": { "object": {
                "id": "pi_1",
                "customer": "cus_1",
                "invoice": null
            } }
        });

        post_signed(&server, &event).await.assert_status_ok();
        settle().await;

        // No sync attempted for the standalone payment intent.
        assert_eq!(subscriptions.count(), 0);
    }
}
