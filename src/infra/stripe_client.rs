use reqwest::Client;
use serde::Deserialize;

use crate::app_error::{AppError, AppResult};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: String,
}

impl StripeClient {
    pub fn new(secret_key: String) -> Self {
        Self {
            client: Client::new(),
            secret_key,
        }
    }

    fn auth_header(&self) -> String {
        use base64::Engine;
        let encoded =
            base64::engine::general_purpose::STANDARD.encode(format!("{}:", self.secret_key));
        format!("Basic {}", encoded)
    }

    // ========================================================================
    // Customers
    // ========================================================================

    pub async fn create_customer(
        &self,
        email: &str,
        user_id: &str,
    ) -> AppResult<StripeCustomer> {
        let params: Vec<(String, String)> = vec![
            ("email".to_string(), email.to_string()),
            ("metadata[userId]".to_string(), user_id.to_string()),
        ];

        let response = self
            .client
            .post(format!("{}/customers", STRIPE_API_BASE))
            .header("Authorization", self.auth_header())
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Stripe request failed: {}", e)))?;

        self.handle_response(response).await
    }

    pub async fn delete_customer(&self, customer_id: &str) -> AppResult<StripeDeleted> {
        let response = self
            .client
            .delete(format!("{}/customers/{}", STRIPE_API_BASE, customer_id))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Stripe request failed: {}", e)))?;

        self.handle_response(response).await
    }

    // ========================================================================
    // Checkout Sessions
    // ========================================================================

    pub async fn create_checkout_session(
        &self,
        customer_id: &str,
        price_id: &str,
        mode: &str,
        success_url: &str,
        cancel_url: &str,
        user_id: &str,
    ) -> AppResult<StripeCheckoutSession> {
        let params: Vec<(String, String)> = vec![
            ("customer".to_string(), customer_id.to_string()),
            (
                "payment_method_types[0]".to_string(),
                "card".to_string(),
            ),
            ("line_items[0][price]".to_string(), price_id.to_string()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("mode".to_string(), mode.to_string()),
            ("success_url".to_string(), success_url.to_string()),
            ("cancel_url".to_string(), cancel_url.to_string()),
            ("metadata[user_id]".to_string(), user_id.to_string()),
        ];

        let response = self
            .client
            .post(format!("{}/checkout/sessions", STRIPE_API_BASE))
            .header("Authorization", self.auth_header())
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Stripe request failed: {}", e)))?;

        self.handle_response(response).await
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// The authoritative listing the webhook sync trusts over event payloads.
    /// Mirrors the sync query shape: newest subscription only, any status,
    /// payment method expanded for card display fields.
    pub async fn list_subscriptions(
        &self,
        customer_id: &str,
    ) -> AppResult<Vec<StripeSubscription>> {
        let query = [
            ("customer", customer_id),
            ("limit", "1"),
            ("status", "all"),
            ("expand[]", "data.default_payment_method"),
        ];

        let response = self
            .client
            .get(format!("{}/subscriptions", STRIPE_API_BASE))
            .header("Authorization", self.auth_header())
            .query(&query)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Stripe request failed: {}", e)))?;

        let list: StripeSubscriptionList = self.handle_response(response).await?;
        Ok(list.data)
    }

    // ========================================================================
    // Webhook Signature Verification
    // ========================================================================

    pub fn verify_webhook_signature(
        payload: &str,
        signature_header: &str,
        webhook_secret: &str,
    ) -> AppResult<()> {
        use hmac::{Hmac, Mac};
        use sha2::Sha256;

        // Parse signature header: "t=timestamp,v1=signature,..."
        let mut timestamp: Option<&str> = None;
        let mut signatures: Vec<&str> = Vec::new();

        for part in signature_header.split(',') {
            let kv: Vec<&str> = part.splitn(2, '=').collect();
            if kv.len() != 2 {
                continue;
            }
            match kv[0] {
                "t" => timestamp = Some(kv[1]),
                "v1" => signatures.push(kv[1]),
                _ => {}
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| AppError::InvalidInput("Missing timestamp in signature".into()))?;

        if signatures.is_empty() {
            return Err(AppError::InvalidInput("Missing signature".into()));
        }

        // Compute expected signature
        let signed_payload = format!("{}.{}", timestamp, payload);
        let mut mac = Hmac::<Sha256>::new_from_slice(webhook_secret.as_bytes())
            .map_err(|_| AppError::Internal("HMAC error".into()))?;
        mac.update(signed_payload.as_bytes());
        let expected = hex::encode(mac.finalize().into_bytes());

        // Check if any signature matches
        for sig in signatures {
            if constant_time_compare(sig, &expected) {
                // Verify timestamp is not too old (5 minutes tolerance)
                let ts: i64 = timestamp
                    .parse()
                    .map_err(|_| AppError::InvalidInput("Invalid timestamp".into()))?;
                let now = chrono::Utc::now().timestamp();
                if (now - ts).abs() > 300 {
                    return Err(AppError::InvalidInput("Timestamp too old".into()));
                }
                return Ok(());
            }
        }

        Err(AppError::InvalidInput("Invalid signature".into()))
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> AppResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            tracing::error!(status = %status, body = %body, "Stripe API error");

            // Try to parse Stripe error
            if let Ok(error) = serde_json::from_str::<StripeErrorResponse>(&body) {
                return Err(AppError::Gateway(format!(
                    "Stripe error: {}",
                    error.error.message.unwrap_or(error.error.error_type)
                )));
            }

            return Err(AppError::Gateway(format!(
                "Stripe API error: {} - {}",
                status, body
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(body = %body, error = %e, "Failed to parse Stripe response");
            AppError::Gateway(format!("Failed to parse Stripe response: {}", e))
        })
    }
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

// ============================================================================
// Stripe Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StripeDeleted {
    pub id: String,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub customer: Option<String>,
    pub subscription: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: String,
    pub status: String,
    pub current_period_start: i64,
    pub current_period_end: i64,
    pub cancel_at_period_end: bool,
    pub items: StripeSubscriptionItems,
    /// Either an expanded payment method object or a bare id, depending on
    /// whether the listing asked for expansion.
    #[serde(default)]
    pub default_payment_method: serde_json::Value,
}

impl StripeSubscription {
    /// Get the first price ID from the subscription items
    pub fn price_id(&self) -> Option<String> {
        self.items
            .data
            .first()
            .map(|item| item.price.id.clone())
    }

    pub fn card_brand(&self) -> Option<String> {
        self.default_payment_method["card"]["brand"]
            .as_str()
            .map(|s| s.to_string())
    }

    pub fn card_last4(&self) -> Option<String> {
        self.default_payment_method["card"]["last4"]
            .as_str()
            .map(|s| s.to_string())
    }
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscriptionItems {
    pub data: Vec<StripeSubscriptionItem>,
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscriptionItem {
    pub id: String,
    pub price: StripePrice,
}

#[derive(Debug, Deserialize)]
pub struct StripePrice {
    pub id: String,
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscriptionList {
    pub data: Vec<StripeSubscription>,
}

#[derive(Debug, Deserialize)]
pub struct StripeErrorResponse {
    pub error: StripeError,
}

#[derive(Debug, Deserialize)]
pub struct StripeError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: Option<String>,
    pub code: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================
