use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::{app_error::AppResult, domain::entities::checkout_mode::CheckoutMode};

// ============================================================================
// Port Types - Provider-agnostic domain types
// ============================================================================

/// A customer record in the payment provider.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayCustomer {
    pub id: String,
    pub email: Option<String>,
}

/// Everything needed to open a hosted checkout for one purchase attempt.
#[derive(Debug, Clone)]
pub struct CreateSessionRequest {
    pub customer_id: String,
    pub price_id: String,
    pub mode: CheckoutMode,
    pub success_url: String,
    pub cancel_url: String,
    /// Application user identity, carried in the session metadata so the
    /// webhook can attribute the completed payment.
    pub user_id: Uuid,
}

/// A provider-hosted checkout session.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayCheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

/// Point-in-time view of one provider-side subscription, as returned by the
/// authoritative listing call.
#[derive(Debug, Clone, Serialize)]
pub struct GatewaySubscription {
    pub id: String,
    /// The provider's own status string, mirrored verbatim.
    pub status: String,
    pub price_id: Option<String>,
    pub current_period_start: i64,
    pub current_period_end: i64,
    pub cancel_at_period_end: bool,
    pub payment_method_brand: Option<String>,
    pub payment_method_last4: Option<String>,
}

// ============================================================================
// Payment Gateway Port
// ============================================================================

/// Payment gateway port - abstracts the payment provider operations the
/// checkout and webhook flows need. The production implementation talks to
/// the Stripe REST API; tests substitute an in-memory mock.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a customer record in the provider, tagged with the application
    /// user id so the mapping can be reconstructed from the provider side.
    async fn create_customer(&self, email: &str, user_id: Uuid) -> AppResult<GatewayCustomer>;

    /// Delete a provider customer. Used only to compensate a failed local
    /// mapping write.
    async fn delete_customer(&self, customer_id: &str) -> AppResult<()>;

    /// Create a hosted checkout session and return its redirect URL.
    async fn create_checkout_session(
        &self,
        request: &CreateSessionRequest,
    ) -> AppResult<GatewayCheckoutSession>;

    /// List the customer's subscriptions from the provider, newest first.
    /// This is the authoritative pull the webhook sync relies on; the event
    /// payload alone is never trusted for subscription state.
    async fn list_subscriptions(&self, customer_id: &str) -> AppResult<Vec<GatewaySubscription>>;
}
