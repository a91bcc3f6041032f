//! Webhook payload builders and signature forging for tests.

use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;

/// Produce a `stripe-signature` header value for a payload, signed the same
/// way the processor signs real deliveries.
pub fn sign_webhook_payload(payload: &str, secret: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp();
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(format!("{timestamp}.{payload}").as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());
    format!("t={timestamp},v1={signature}")
}

/// A `checkout.session.completed` event for a one-time payment.
pub fn checkout_completed_payment_event(
    session_id: &str,
    customer_id: &str,
    user_id: &str,
) -> serde_json::Value {
    json!({
        "id": "evt_test_payment",
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": session_id,
                "object": "checkout.session",
                "customer": customer_id,
                "mode": "payment",
                "payment_status": "paid",
                "payment_intent": "pi_test_1",
                "amount_subtotal": 499,
                "amount_total": 499,
                "currency": "usd",
                "metadata": { "user_id": user_id }
            }
        }
    })
}

/// A `checkout.session.completed` event for a subscription purchase.
pub fn checkout_completed_subscription_event(customer_id: &str) -> serde_json::Value {
    json!({
        "id": "evt_test_subscription",
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": "cs_test_sub",
                "object": "checkout.session",
                "customer": customer_id,
                "mode": "subscription",
                "payment_status": "paid",
                "subscription": "sub_test_1",
                "metadata": {}
            }
        }
    })
}

/// A `customer.subscription.updated` event. The sync path ignores the payload
/// details and re-fetches from the gateway, so only the customer id matters.
pub fn subscription_updated_event(customer_id: &str) -> serde_json::Value {
    json!({
        "id": "evt_test_sub_updated",
        "type": "customer.subscription.updated",
        "data": {
            "object": {
                "id": "sub_test_1",
                "object": "subscription",
                "customer": customer_id,
                "status": "active"
            }
        }
    })
}
