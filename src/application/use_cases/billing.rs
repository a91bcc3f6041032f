//! Billing orchestration: checkout initiation and webhook-driven
//! reconciliation of processor state into the local mirror tables.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::jwt::AuthenticatedUser,
    application::ports::payment_gateway::{
        CreateSessionRequest, GatewayCheckoutSession, GatewaySubscription, PaymentGateway,
    },
    domain::entities::{
        checkout_mode::CheckoutMode,
        order_status::OrderStatus,
        subscription::grants_access,
    },
};

/// Convert a Unix timestamp to NaiveDateTime
fn timestamp_to_naive(secs: i64) -> Option<NaiveDateTime> {
    DateTime::<Utc>::from_timestamp(secs, 0).map(|dt| dt.naive_utc())
}

// ============================================================================
// Profile Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct CustomerMappingProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub customer_id: String,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
    pub deleted_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderProfile {
    pub id: Uuid,
    pub checkout_session_id: String,
    pub payment_intent_id: Option<String>,
    pub customer_id: String,
    pub user_id: Uuid,
    pub amount_subtotal: Option<i64>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub payment_status: Option<String>,
    pub status: OrderStatus,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionProfile {
    pub id: Uuid,
    pub customer_id: String,
    pub subscription_id: Option<String>,
    pub price_id: Option<String>,
    pub current_period_start: Option<NaiveDateTime>,
    pub current_period_end: Option<NaiveDateTime>,
    pub cancel_at_period_end: bool,
    pub payment_method_brand: Option<String>,
    pub payment_method_last4: Option<String>,
    /// The processor's last-reported status, verbatim.
    pub status: String,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

// ============================================================================
// Input Types
// ============================================================================

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
    pub mode: CheckoutMode,
}

#[derive(Debug, Clone)]
pub struct CreateOrderInput {
    pub checkout_session_id: String,
    pub payment_intent_id: Option<String>,
    pub customer_id: String,
    pub user_id: Uuid,
    pub amount_subtotal: Option<i64>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub payment_status: Option<String>,
    pub status: OrderStatus,
}

/// Full mirror-row update derived from one provider-side subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionSync {
    pub customer_id: String,
    pub subscription_id: Option<String>,
    pub price_id: Option<String>,
    pub current_period_start: Option<NaiveDateTime>,
    pub current_period_end: Option<NaiveDateTime>,
    pub cancel_at_period_end: bool,
    pub payment_method_brand: Option<String>,
    pub payment_method_last4: Option<String>,
    pub status: String,
}

impl SubscriptionSync {
    fn from_gateway(customer_id: &str, sub: &GatewaySubscription) -> Self {
        SubscriptionSync {
            customer_id: customer_id.to_string(),
            subscription_id: Some(sub.id.clone()),
            price_id: sub.price_id.clone(),
            current_period_start: timestamp_to_naive(sub.current_period_start),
            current_period_end: timestamp_to_naive(sub.current_period_end),
            cancel_at_period_end: sub.cancel_at_period_end,
            payment_method_brand: sub.payment_method_brand.clone(),
            payment_method_last4: sub.payment_method_last4.clone(),
            status: sub.status.clone(),
        }
    }
}

// ============================================================================
// Repository Traits
// ============================================================================

#[async_trait]
pub trait CustomerMappingRepo: Send + Sync {
    /// Active (non-soft-deleted) mapping for a user, if any.
    async fn get_by_user_id(&self, user_id: Uuid) -> AppResult<Option<CustomerMappingProfile>>;

    async fn insert(&self, user_id: Uuid, customer_id: &str) -> AppResult<CustomerMappingProfile>;
}

#[async_trait]
pub trait OrderRepo: Send + Sync {
    /// Insert-only; a duplicate checkout session id surfaces as an error.
    async fn insert(&self, input: &CreateOrderInput) -> AppResult<OrderProfile>;

    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<OrderProfile>>;

    /// Completed, non-unpaid orders for the premium check.
    async fn count_completed_by_user(&self, user_id: Uuid) -> AppResult<i64>;
}

#[async_trait]
pub trait SubscriptionRepo: Send + Sync {
    async fn get_by_customer_id(&self, customer_id: &str)
    -> AppResult<Option<SubscriptionProfile>>;

    /// Seed the `not_started` placeholder row for a customer.
    async fn insert_placeholder(&self, customer_id: &str) -> AppResult<SubscriptionProfile>;

    /// Reset the mirror row to `not_started` without touching other columns,
    /// creating it if missing. Used when the provider reports no subscription.
    async fn mark_not_started(&self, customer_id: &str) -> AppResult<SubscriptionProfile>;

    /// Overwrite the mirror row with the provider's current state, keyed by
    /// customer id. Last write wins.
    async fn upsert_from_gateway(&self, sync: &SubscriptionSync) -> AppResult<SubscriptionProfile>;

    /// Remove any rows for a customer. Only used to compensate a failed
    /// mapping write during checkout.
    async fn delete_by_customer_id(&self, customer_id: &str) -> AppResult<()>;
}

// ============================================================================
// Use Cases
// ============================================================================

pub struct BillingUseCases {
    customers: Arc<dyn CustomerMappingRepo>,
    orders: Arc<dyn OrderRepo>,
    subscriptions: Arc<dyn SubscriptionRepo>,
    gateway: Arc<dyn PaymentGateway>,
}

impl BillingUseCases {
    pub fn new(
        customers: Arc<dyn CustomerMappingRepo>,
        orders: Arc<dyn OrderRepo>,
        subscriptions: Arc<dyn SubscriptionRepo>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            customers,
            orders,
            subscriptions,
            gateway,
        }
    }

    // ========================================================================
    // Checkout
    // ========================================================================

    /// Ensure a customer mapping exists for the caller, then open a hosted
    /// checkout session for the requested price and mode.
    pub async fn create_checkout(
        &self,
        user: &AuthenticatedUser,
        request: &CheckoutRequest,
    ) -> AppResult<GatewayCheckoutSession> {
        let customer_id = match self.customers.get_by_user_id(user.id).await? {
            None => self.create_customer_mapping(user, request.mode).await?,
            Some(mapping) => {
                if request.mode == CheckoutMode::Subscription {
                    let existing = self
                        .subscriptions
                        .get_by_customer_id(&mapping.customer_id)
                        .await?;
                    if existing.is_none() {
                        self.subscriptions
                            .insert_placeholder(&mapping.customer_id)
                            .await?;
                    }
                }
                mapping.customer_id
            }
        };

        let session = self
            .gateway
            .create_checkout_session(&CreateSessionRequest {
                customer_id: customer_id.clone(),
                price_id: request.price_id.clone(),
                mode: request.mode,
                success_url: request.success_url.clone(),
                cancel_url: request.cancel_url.clone(),
                user_id: user.id,
            })
            .await?;

        info!(
            session_id = %session.id,
            customer_id = %customer_id,
            "Created checkout session"
        );

        Ok(session)
    }

    /// Create the remote customer and the local mapping, compensating the
    /// remote side (best-effort) if the local write fails.
    async fn create_customer_mapping(
        &self,
        user: &AuthenticatedUser,
        mode: CheckoutMode,
    ) -> AppResult<String> {
        let customer = self.gateway.create_customer(&user.email, user.id).await?;

        info!(
            customer_id = %customer.id,
            user_id = %user.id,
            "Created new payment-provider customer"
        );

        if let Err(e) = self.customers.insert(user.id, &customer.id).await {
            error!(error = %e, customer_id = %customer.id, "Failed to save customer mapping");
            if let Err(cleanup_err) = self.gateway.delete_customer(&customer.id).await {
                error!(
                    error = %cleanup_err,
                    customer_id = %customer.id,
                    "Failed to clean up after customer mapping error"
                );
            }
            if let Err(cleanup_err) = self.subscriptions.delete_by_customer_id(&customer.id).await {
                error!(
                    error = %cleanup_err,
                    customer_id = %customer.id,
                    "Failed to clean up after customer mapping error"
                );
            }
            return Err(e);
        }

        if mode == CheckoutMode::Subscription {
            if let Err(e) = self.subscriptions.insert_placeholder(&customer.id).await {
                error!(error = %e, customer_id = %customer.id, "Failed to save subscription placeholder");
                if let Err(cleanup_err) = self.gateway.delete_customer(&customer.id).await {
                    error!(
                        error = %cleanup_err,
                        customer_id = %customer.id,
                        "Failed to delete payment-provider customer after subscription error"
                    );
                }
                return Err(e);
            }
        }

        Ok(customer.id)
    }

    // ========================================================================
    // Webhook Reconciliation
    // ========================================================================

    /// Process one verified processor event. Runs in a detached background
    /// task after the webhook endpoint has already acknowledged the delivery,
    /// so failures here are logged by the caller and never retried.
    pub async fn handle_webhook_event(&self, event: serde_json::Value) -> AppResult<()> {
        let event_type = event["type"].as_str().unwrap_or("");
        let object = &event["data"]["object"];

        let Some(customer_value) = object.get("customer") else {
            debug!(event_type, "Event object has no customer field, skipping");
            return Ok(());
        };

        // Standalone payment intents (no invoice) are covered by the
        // checkout-completion event; skip them here.
        if event_type == "payment_intent.succeeded" && object["invoice"].is_null() {
            return Ok(());
        }

        let Some(customer_id) = customer_value.as_str() else {
            error!(event_type, "No customer id received on event");
            return Ok(());
        };

        let mut is_subscription = true;
        if event_type == "checkout.session.completed" {
            is_subscription = object["mode"].as_str() == Some("subscription");
            info!(
                customer_id,
                mode = object["mode"].as_str().unwrap_or(""),
                "Processing checkout session completion"
            );
        }

        if is_subscription {
            info!(customer_id, "Starting subscription sync");
            self.sync_customer_from_gateway(customer_id).await
        } else if object["mode"].as_str() == Some("payment")
            && object["payment_status"].as_str() == Some("paid")
        {
            self.record_one_time_payment(customer_id, object).await
        } else {
            Ok(())
        }
    }

    /// Authoritative pull: re-fetch the customer's subscription list from the
    /// provider and overwrite the local mirror row. An empty listing resets
    /// the row to `not_started` instead of deleting it.
    pub async fn sync_customer_from_gateway(&self, customer_id: &str) -> AppResult<()> {
        let subscriptions = self.gateway.list_subscriptions(customer_id).await?;

        match subscriptions.first() {
            None => {
                info!(customer_id, "No subscriptions found for customer");
                self.subscriptions.mark_not_started(customer_id).await?;
            }
            Some(subscription) => {
                let sync = SubscriptionSync::from_gateway(customer_id, subscription);
                self.subscriptions.upsert_from_gateway(&sync).await?;
                info!(customer_id, status = %subscription.status, "Synced subscription");
            }
        }

        Ok(())
    }

    /// Record a completed one-time payment from its checkout session object.
    async fn record_one_time_payment(
        &self,
        customer_id: &str,
        session: &serde_json::Value,
    ) -> AppResult<()> {
        let Some(user_id_str) = session["metadata"]["user_id"].as_str() else {
            error!(customer_id, "No user_id found in checkout session metadata");
            return Ok(());
        };

        let user_id = match Uuid::parse_str(user_id_str) {
            Ok(id) => id,
            Err(_) => {
                error!(
                    customer_id,
                    user_id = user_id_str,
                    "Invalid user_id in checkout session metadata"
                );
                return Ok(());
            }
        };

        let checkout_session_id = session["id"].as_str().unwrap_or("").to_string();

        let input = CreateOrderInput {
            checkout_session_id: checkout_session_id.clone(),
            payment_intent_id: session["payment_intent"].as_str().map(|s| s.to_string()),
            customer_id: customer_id.to_string(),
            user_id,
            amount_subtotal: session["amount_subtotal"].as_i64(),
            amount_total: session["amount_total"].as_i64(),
            currency: session["currency"].as_str().map(|s| s.to_string()),
            payment_status: session["payment_status"].as_str().map(|s| s.to_string()),
            status: OrderStatus::Completed,
        };

        self.orders.insert(&input).await?;

        info!(
            session_id = %checkout_session_id,
            user_id = %user_id,
            "Recorded one-time payment"
        );

        Ok(())
    }

    // ========================================================================
    // Read Side
    // ========================================================================

    /// The caller's subscription mirror row, if a mapping exists.
    pub async fn get_subscription_for_user(
        &self,
        user_id: Uuid,
    ) -> AppResult<Option<SubscriptionProfile>> {
        let Some(mapping) = self.customers.get_by_user_id(user_id).await? else {
            return Ok(None);
        };
        self.subscriptions
            .get_by_customer_id(&mapping.customer_id)
            .await
    }

    pub async fn list_orders_for_user(&self, user_id: Uuid) -> AppResult<Vec<OrderProfile>> {
        self.orders.list_by_user(user_id).await
    }

    /// Premium is derived state: at least one completed order, or a
    /// subscription whose last-reported status grants access.
    pub async fn premium_status(&self, user_id: Uuid) -> AppResult<bool> {
        if self.orders.count_completed_by_user(user_id).await? > 0 {
            return Ok(true);
        }

        Ok(self
            .get_subscription_for_user(user_id)
            .await?
            .map(|s| grants_access(&s.status))
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_conversion_handles_epoch_values() {
        let dt = timestamp_to_naive(1_700_000_000).unwrap();
        assert_eq!(dt.and_utc().timestamp(), 1_700_000_000);
        assert!(timestamp_to_naive(i64::MAX).is_none());
    }

    #[test]
    fn sync_is_built_verbatim_from_gateway_state() {
        let sub = GatewaySubscription {
            id: "sub_123".to_string(),
            status: "past_due".to_string(),
            price_id: Some("price_1".to_string()),
            current_period_start: 1_700_000_000,
            current_period_end: 1_702_592_000,
            cancel_at_period_end: true,
            payment_method_brand: Some("visa".to_string()),
            payment_method_last4: Some("4242".to_string()),
        };

        let sync = SubscriptionSync::from_gateway("cus_1", &sub);
        assert_eq!(sync.customer_id, "cus_1");
        assert_eq!(sync.subscription_id.as_deref(), Some("sub_123"));
        assert_eq!(sync.status, "past_due");
        assert!(sync.cancel_at_period_end);
        assert_eq!(sync.payment_method_last4.as_deref(), Some("4242"));
        assert_eq!(
            sync.current_period_end.unwrap().and_utc().timestamp(),
            1_702_592_000
        );
    }
}
