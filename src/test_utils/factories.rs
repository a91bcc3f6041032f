//! Test data factories for creating valid test fixtures.
//!
//! Each factory function creates a complete, valid object with sensible
//! defaults. Use the closure parameter to override specific fields as needed.

use chrono::NaiveDateTime;
use secrecy::SecretString;
use uuid::Uuid;

use crate::{
    application::jwt,
    application::ports::payment_gateway::GatewaySubscription,
    application::use_cases::billing::{OrderProfile, SubscriptionProfile},
    domain::entities::order_status::OrderStatus,
    domain::entities::subscription::STATUS_NOT_STARTED,
};

/// Secret the test builder's `AppConfig` uses for token verification.
pub const TEST_JWT_SECRET: &str = "test_jwt_secret";

/// Secret the test builder's `AppConfig` uses for webhook signatures.
pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";

pub fn test_datetime() -> NaiveDateTime {
    chrono::DateTime::from_timestamp(1_700_000_000, 0)
        .unwrap()
        .naive_utc()
}

/// A full `Authorization` header value for a user, signed with the test
/// secret.
pub fn bearer_token_for(user_id: Uuid, email: &str) -> String {
    let secret = SecretString::new(TEST_JWT_SECRET.into());
    let token = jwt::issue(user_id, email, &secret, time::Duration::hours(1))
        .expect("test token should sign");
    format!("Bearer {token}")
}

/// Create a test subscription mirror row with sensible defaults.
pub fn create_test_subscription(
    customer_id: &str,
    overrides: impl FnOnce(&mut SubscriptionProfile),
) -> SubscriptionProfile {
    let mut subscription = SubscriptionProfile {
        id: Uuid::new_v4(),
        customer_id: customer_id.to_string(),
        subscription_id: Some("sub_test_1".to_string()),
        price_id: Some("price_test_1".to_string()),
        current_period_start: Some(test_datetime()),
        current_period_end: Some(test_datetime()),
        cancel_at_period_end: false,
        payment_method_brand: None,
        payment_method_last4: None,
        status: STATUS_NOT_STARTED.to_string(),
        created_at: Some(test_datetime()),
        updated_at: Some(test_datetime()),
    };
    overrides(&mut subscription);
    subscription
}

/// Create a completed test order with sensible defaults.
pub fn create_test_order(
    user_id: Uuid,
    overrides: impl FnOnce(&mut OrderProfile),
) -> OrderProfile {
    let mut order = OrderProfile {
        id: Uuid::new_v4(),
        checkout_session_id: format!("cs_test_{}", Uuid::new_v4().simple()),
        payment_intent_id: Some("pi_test_1".to_string()),
        customer_id: "cus_test_1".to_string(),
        user_id,
        amount_subtotal: Some(499),
        amount_total: Some(499),
        currency: Some("usd".to_string()),
        payment_status: Some("paid".to_string()),
        status: OrderStatus::Completed,
        created_at: Some(test_datetime()),
    };
    overrides(&mut order);
    order
}

/// Create a gateway-side subscription with sensible defaults.
pub fn test_gateway_subscription(
    overrides: impl FnOnce(&mut GatewaySubscription),
) -> GatewaySubscription {
    let mut subscription = GatewaySubscription {
        id: "sub_test_1".to_string(),
        status: "active".to_string(),
        price_id: Some("price_test_1".to_string()),
        current_period_start: 1_700_000_000,
        current_period_end: 1_702_592_000,
        cancel_at_period_end: false,
        payment_method_brand: None,
        payment_method_last4: None,
    };
    overrides(&mut subscription);
    subscription
}
