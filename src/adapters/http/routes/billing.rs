//! Billing routes: checkout initiation, subscription status, order history,
//! premium flag.

use super::common::*;
use crate::{
    application::use_cases::billing::{CheckoutRequest, OrderProfile, SubscriptionProfile},
    domain::entities::{checkout_mode::CheckoutMode, subscription::STATUS_NOT_STARTED},
};

// ============================================================================
// Types
// ============================================================================

#[derive(Serialize)]
struct CheckoutResponse {
    #[serde(rename = "sessionId")]
    session_id: String,
    url: String,
}

#[derive(Serialize)]
struct SubscriptionResponse {
    subscription_id: Option<String>,
    price_id: Option<String>,
    status: String,
    current_period_start: Option<i64>,
    current_period_end: Option<i64>,
    cancel_at_period_end: Option<bool>,
    payment_method_brand: Option<String>,
    payment_method_last4: Option<String>,
}

impl SubscriptionResponse {
    fn not_started() -> Self {
        SubscriptionResponse {
            subscription_id: None,
            price_id: None,
            status: STATUS_NOT_STARTED.to_string(),
            current_period_start: None,
            current_period_end: None,
            cancel_at_period_end: None,
            payment_method_brand: None,
            payment_method_last4: None,
        }
    }
}

impl From<SubscriptionProfile> for SubscriptionResponse {
    fn from(sub: SubscriptionProfile) -> Self {
        SubscriptionResponse {
            subscription_id: sub.subscription_id,
            price_id: sub.price_id,
            status: sub.status,
            current_period_start: sub
                .current_period_start
                .map(|dt| dt.and_utc().timestamp()),
            current_period_end: sub.current_period_end.map(|dt| dt.and_utc().timestamp()),
            cancel_at_period_end: Some(sub.cancel_at_period_end),
            payment_method_brand: sub.payment_method_brand,
            payment_method_last4: sub.payment_method_last4,
        }
    }
}

#[derive(Serialize)]
struct OrderResponse {
    id: String,
    checkout_session_id: String,
    payment_intent_id: Option<String>,
    amount_subtotal: Option<i64>,
    amount_total: Option<i64>,
    currency: Option<String>,
    payment_status: Option<String>,
    status: String,
    created_at: Option<i64>,
}

impl From<OrderProfile> for OrderResponse {
    fn from(order: OrderProfile) -> Self {
        OrderResponse {
            id: order.id.to_string(),
            checkout_session_id: order.checkout_session_id,
            payment_intent_id: order.payment_intent_id,
            amount_subtotal: order.amount_subtotal,
            amount_total: order.amount_total,
            currency: order.currency,
            payment_status: order.payment_status,
            status: order.status.to_string(),
            created_at: order.created_at.map(|dt| dt.and_utc().timestamp()),
        }
    }
}

#[derive(Serialize)]
struct PremiumStatusResponse {
    is_premium: bool,
}

// ============================================================================
// Payload Validation
// ============================================================================

const STRING_FIELDS: [&str; 3] = ["price_id", "success_url", "cancel_url"];

/// Validate the checkout payload field by field, with the same messages the
/// client has always seen for each failure shape.
fn parse_checkout_payload(value: &serde_json::Value) -> AppResult<CheckoutRequest> {
    for field in STRING_FIELDS {
        match value.get(field) {
            None | Some(serde_json::Value::Null) => {
                return Err(AppError::InvalidInput(format!(
                    "Missing required parameter {field}"
                )));
            }
            Some(serde_json::Value::String(_)) => {}
            Some(other) => {
                return Err(AppError::InvalidInput(format!(
                    "Expected parameter {field} to be a string got {other}"
                )));
            }
        }
    }

    let mode = value
        .get("mode")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<CheckoutMode>().ok())
        .ok_or_else(|| {
            AppError::InvalidInput(
                "Expected parameter mode to be one of payment, subscription".into(),
            )
        })?;

    Ok(CheckoutRequest {
        price_id: value["price_id"].as_str().unwrap_or_default().to_string(),
        success_url: value["success_url"]
            .as_str()
            .unwrap_or_default()
            .to_string(),
        cancel_url: value["cancel_url"].as_str().unwrap_or_default().to_string(),
        mode,
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/billing/checkout
/// Ensures a processor customer exists for the caller and returns a hosted
/// checkout URL for the requested price and mode.
async fn create_checkout(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> AppResult<impl IntoResponse> {
    let user = require_user(&app_state, &headers)?;

    let payload: serde_json::Value = serde_json::from_str(&body)
        .map_err(|e| AppError::InvalidInput(format!("Invalid JSON body: {e}")))?;
    let request = parse_checkout_payload(&payload)?;

    let session = app_state
        .billing_use_cases
        .create_checkout(&user, &request)
        .await?;

    let url = session.url.ok_or(AppError::Internal(
        "Checkout session missing redirect URL".into(),
    ))?;

    Ok(Json(CheckoutResponse {
        session_id: session.id,
        url,
    }))
}

/// GET /api/billing/subscription
/// Returns the caller's subscription mirror record. Users that never started
/// a subscription checkout get the `not_started` placeholder shape.
async fn get_subscription(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let user = require_user(&app_state, &headers)?;

    let response = app_state
        .billing_use_cases
        .get_subscription_for_user(user.id)
        .await?
        .map(SubscriptionResponse::from)
        .unwrap_or_else(SubscriptionResponse::not_started);

    Ok(Json(response))
}

/// GET /api/billing/orders
/// Returns the caller's one-time payment history, newest first.
async fn list_orders(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let user = require_user(&app_state, &headers)?;

    let orders = app_state
        .billing_use_cases
        .list_orders_for_user(user.id)
        .await?;

    let response: Vec<OrderResponse> = orders.into_iter().map(OrderResponse::from).collect();

    Ok(Json(response))
}

/// GET /api/billing/status
/// Derived premium flag: a completed order or an access-granting
/// subscription.
async fn premium_status(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let user = require_user(&app_state, &headers)?;

    let is_premium = app_state.billing_use_cases.premium_status(user.id).await?;

    Ok(Json(PremiumStatusResponse { is_premium }))
}

// ============================================================================
// Router
// ============================================================================

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/billing/checkout", post(create_checkout))
        .route("/billing/subscription", get(get_subscription))
        .route("/billing/orders", get(list_orders))
        .route("/billing/status", get(premium_status))
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

    use crate::domain::entities::order_status::OrderStatus;
    use crate::test_utils::{
        TestAppStateBuilder, bearer_token_for, create_test_order, create_test_subscription,
    };

    fn build_test_server(app_state: AppState) -> TestServer {
        let router: Router = crate::adapters::http::routes::router().with_state(app_state);
        TestServer::new(router).unwrap()
    }

    fn checkout_body(mode: &str) -> serde_json::Value {
        json!({
            "price_id": "price_lifetime",
            "success_url": "https://app.example.com/dashboard",
            "cancel_url": "https://app.example.com/pricing",
            "mode": mode,
        })
    }

    // =========================================================================
    // POST /billing/checkout - auth and validation
    // =========================================================================

    #[tokio::test]
    async fn checkout_without_auth_header_returns_401() {
        let builder = TestAppStateBuilder::new();
        let customers = builder.customers();
        let server = build_test_server(builder.build());

        let response = server
            .post("/billing/checkout")
            .json(&checkout_body("payment"))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(customers.count(), 0);
    }

    #[tokio::test]
    async fn checkout_with_invalid_token_returns_401() {
        let server = build_test_server(TestAppStateBuilder::new().build());

        let response = server
            .post("/billing/checkout")
            .add_header("authorization", "Bearer not-a-real-token")
            .json(&checkout_body("payment"))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn checkout_missing_price_id_returns_400_and_writes_nothing() {
        let builder = TestAppStateBuilder::new();
        let customers = builder.customers();
        let subscriptions = builder.subscriptions();
        let server = build_test_server(builder.build());

        let user_id = Uuid::new_v4();
        let response = server
            .post("/billing/checkout")
            .add_header("authorization", bearer_token_for(user_id, "u@example.com"))
            .json(&json!({
                "success_url": "https://app.example.com/dashboard",
                "cancel_url": "https://app.example.com/pricing",
                "mode": "payment",
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "Missing required parameter price_id");
        assert_eq!(customers.count(), 0);
        assert_eq!(subscriptions.count(), 0);
    }

    #[tokio::test]
    async fn checkout_with_non_string_field_returns_400() {
        let server = build_test_server(TestAppStateBuilder::new().build());

        let response = server
            .post("/billing/checkout")
            .add_header(
                "authorization",
                bearer_token_for(Uuid::new_v4(), "u@example.com"),
            )
            .json(&json!({
                "price_id": 42,
                "success_url": "https://app.example.com/dashboard",
                "cancel_url": "https://app.example.com/pricing",
                "mode": "payment",
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(
            body["error"],
            "Expected parameter price_id to be a string got 42"
        );
    }

    #[tokio::test]
    async fn checkout_with_unknown_mode_returns_400() {
        let server = build_test_server(TestAppStateBuilder::new().build());

        let response = server
            .post("/billing/checkout")
            .add_header(
                "authorization",
                bearer_token_for(Uuid::new_v4(), "u@example.com"),
            )
            .json(&checkout_body("setup"))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(
            body["error"],
            "Expected parameter mode to be one of payment, subscription"
        );
    }

    // =========================================================================
    // POST /billing/checkout - happy paths
    // =========================================================================

    #[tokio::test]
    async fn checkout_payment_mode_first_time_creates_mapping_only() {
        let builder = TestAppStateBuilder::new();
        let customers = builder.customers();
        let subscriptions = builder.subscriptions();
        let gateway = builder.gateway();
        let server = build_test_server(builder.build());

        let user_id = Uuid::new_v4();
        let response = server
            .post("/billing/checkout")
            .add_header("authorization", bearer_token_for(user_id, "u@example.com"))
            .json(&checkout_body("payment"))
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert!(body["sessionId"].as_str().unwrap().starts_with("cs_test_"));
        assert!(
            body["url"]
                .as_str()
                .unwrap()
                .starts_with("https://checkout.stripe.com/")
        );

        assert_eq!(customers.count(), 1);
        assert_eq!(subscriptions.count(), 0);

        let sessions = gateway.created_sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].price_id, "price_lifetime");
        assert_eq!(sessions[0].user_id, user_id);
    }

    #[tokio::test]
    async fn checkout_subscription_mode_first_time_seeds_placeholder() {
        let builder = TestAppStateBuilder::new();
        let customers = builder.customers();
        let subscriptions = builder.subscriptions();
        let server = build_test_server(builder.build());

        let user_id = Uuid::new_v4();
        let response = server
            .post("/billing/checkout")
            .add_header("authorization", bearer_token_for(user_id, "u@example.com"))
            .json(&checkout_body("subscription"))
            .await;

        response.assert_status_ok();
        assert_eq!(customers.count(), 1);

        let mapping = customers.get_for_user(user_id).unwrap();
        let placeholder = subscriptions.get(&mapping.customer_id).unwrap();
        assert_eq!(placeholder.status, "not_started");
        assert!(placeholder.subscription_id.is_none());
    }

    #[tokio::test]
    async fn checkout_reuses_existing_mapping() {
        let builder = TestAppStateBuilder::new();
        let customers = builder.customers();
        let gateway = builder.gateway();
        let server = build_test_server(builder.build());

        let user_id = Uuid::new_v4();
        let token = bearer_token_for(user_id, "u@example.com");

        let first = server
            .post("/billing/checkout")
            .add_header("authorization", token.clone())
            .json(&checkout_body("payment"))
            .await;
        first.assert_status_ok();

        let second = server
            .post("/billing/checkout")
            .add_header("authorization", token)
            .json(&checkout_body("payment"))
            .await;
        second.assert_status_ok();

        // One remote customer, one mapping, two sessions.
        assert_eq!(gateway.created_customers().len(), 1);
        assert_eq!(customers.count(), 1);
        assert_eq!(gateway.created_sessions().len(), 2);
    }

    #[tokio::test]
    async fn checkout_subscription_for_existing_customer_without_row_seeds_placeholder() {
        let builder = TestAppStateBuilder::new();
        let customers = builder.customers();
        let subscriptions = builder.subscriptions();
        let server = build_test_server(builder.build());

        let user_id = Uuid::new_v4();
        customers.seed(user_id, "cus_existing");

        let response = server
            .post("/billing/checkout")
            .add_header("authorization", bearer_token_for(user_id, "u@example.com"))
            .json(&checkout_body("subscription"))
            .await;

        response.assert_status_ok();
        let placeholder = subscriptions.get("cus_existing").unwrap();
        assert_eq!(placeholder.status, "not_started");
    }

    #[tokio::test]
    async fn checkout_mapping_write_failure_deletes_remote_customer() {
        let builder = TestAppStateBuilder::new();
        let customers = builder.customers();
        let gateway = builder.gateway();
        let server = build_test_server(builder.build());

        customers.set_fail_inserts(true);

        let response = server
            .post("/billing/checkout")
            .add_header(
                "authorization",
                bearer_token_for(Uuid::new_v4(), "u@example.com"),
            )
            .json(&checkout_body("payment"))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(customers.count(), 0);

        // The remote customer that was created got compensated away.
        let created = gateway.created_customers();
        assert_eq!(created.len(), 1);
        assert_eq!(gateway.deleted_customers(), vec![created[0].id.clone()]);
        // And no checkout session was attempted.
        assert!(gateway.created_sessions().is_empty());
    }

    // =========================================================================
    // GET /billing/subscription
    // =========================================================================

    #[tokio::test]
    async fn subscription_requires_auth() {
        let server = build_test_server(TestAppStateBuilder::new().build());

        let response = server.get("/billing/subscription").await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn subscription_returns_not_started_for_unknown_user() {
        let server = build_test_server(TestAppStateBuilder::new().build());

        let response = server
            .get("/billing/subscription")
            .add_header(
                "authorization",
                bearer_token_for(Uuid::new_v4(), "u@example.com"),
            )
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["status"], "not_started");
        assert!(body["subscription_id"].is_null());
    }

    #[tokio::test]
    async fn subscription_returns_mirror_row() {
        let builder = TestAppStateBuilder::new();
        let customers = builder.customers();
        let subscriptions = builder.subscriptions();
        let server = build_test_server(builder.build());

        let user_id = Uuid::new_v4();
        customers.seed(user_id, "cus_1");
        subscriptions.seed(create_test_subscription("cus_1", |s| {
            s.subscription_id = Some("sub_1".to_string());
            s.price_id = Some("price_monthly".to_string());
            s.status = "active".to_string();
            s.payment_method_brand = Some("visa".to_string());
            s.payment_method_last4 = Some("4242".to_string());
        }));

        let response = server
            .get("/billing/subscription")
            .add_header("authorization", bearer_token_for(user_id, "u@example.com"))
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["subscription_id"], "sub_1");
        assert_eq!(body["price_id"], "price_monthly");
        assert_eq!(body["status"], "active");
        assert_eq!(body["payment_method_last4"], "4242");
        assert_eq!(body["cancel_at_period_end"], false);
    }

    // =========================================================================
    // GET /billing/orders
    // =========================================================================

    #[tokio::test]
    async fn orders_lists_the_callers_orders() {
        let builder = TestAppStateBuilder::new();
        let orders = builder.orders();
        let server = build_test_server(builder.build());

        let user_id = Uuid::new_v4();
        orders.seed(create_test_order(user_id, |o| {
            o.checkout_session_id = "cs_a".to_string();
            o.amount_total = Some(999);
        }));
        // Someone else's order must not leak.
        orders.seed(create_test_order(Uuid::new_v4(), |o| {
            o.checkout_session_id = "cs_b".to_string();
        }));

        let response = server
            .get("/billing/orders")
            .add_header("authorization", bearer_token_for(user_id, "u@example.com"))
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        let list = body.as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["checkout_session_id"], "cs_a");
        assert_eq!(list[0]["amount_total"], 999);
        assert_eq!(list[0]["status"], "completed");
    }

    // =========================================================================
    // GET /billing/status
    // =========================================================================

    #[tokio::test]
    async fn status_premium_with_completed_order() {
        let builder = TestAppStateBuilder::new();
        let orders = builder.orders();
        let server = build_test_server(builder.build());

        let user_id = Uuid::new_v4();
        orders.seed(create_test_order(user_id, |_| {}));

        let response = server
            .get("/billing/status")
            .add_header("authorization", bearer_token_for(user_id, "u@example.com"))
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["is_premium"], true);
    }

    #[tokio::test]
    async fn status_premium_with_active_subscription() {
        let builder = TestAppStateBuilder::new();
        let customers = builder.customers();
        let subscriptions = builder.subscriptions();
        let server = build_test_server(builder.build());

        let user_id = Uuid::new_v4();
        customers.seed(user_id, "cus_1");
        subscriptions.seed(create_test_subscription("cus_1", |s| {
            s.status = "active".to_string();
        }));

        let response = server
            .get("/billing/status")
            .add_header("authorization", bearer_token_for(user_id, "u@example.com"))
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["is_premium"], true);
    }

    #[tokio::test]
    async fn status_not_premium_without_orders_or_subscription() {
        let builder = TestAppStateBuilder::new();
        let customers = builder.customers();
        let subscriptions = builder.subscriptions();
        let orders = builder.orders();
        let server = build_test_server(builder.build());

        let user_id = Uuid::new_v4();
        customers.seed(user_id, "cus_1");
        subscriptions.seed(create_test_subscription("cus_1", |s| {
            s.status = "canceled".to_string();
        }));
        // A pending (never paid) order must not grant access.
        orders.seed(create_test_order(user_id, |o| {
            o.status = OrderStatus::Pending;
        }));

        let response = server
            .get("/billing/status")
            .add_header("authorization", bearer_token_for(user_id, "u@example.com"))
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["is_premium"], false);
    }

    // =========================================================================
    // Method handling
    // =========================================================================

    #[tokio::test]
    async fn wrong_method_returns_405_with_error_body() {
        let server = build_test_server(TestAppStateBuilder::new().build());

        let response = server.get("/billing/checkout").await;

        response.assert_status(StatusCode::METHOD_NOT_ALLOWED);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "Method not allowed");
    }
}
