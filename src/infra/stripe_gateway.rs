//! `PaymentGateway` implementation backed by the Stripe REST API.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    application::ports::payment_gateway::{
        CreateSessionRequest, GatewayCheckoutSession, GatewayCustomer, GatewaySubscription,
        PaymentGateway,
    },
    infra::stripe_client::StripeClient,
};

pub struct StripeGateway {
    client: StripeClient,
}

impl StripeGateway {
    pub fn new(secret_key: String) -> Self {
        Self {
            client: StripeClient::new(secret_key),
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_customer(&self, email: &str, user_id: Uuid) -> AppResult<GatewayCustomer> {
        let customer = self
            .client
            .create_customer(email, &user_id.to_string())
            .await?;
        Ok(GatewayCustomer {
            id: customer.id,
            email: customer.email,
        })
    }

    async fn delete_customer(&self, customer_id: &str) -> AppResult<()> {
        self.client.delete_customer(customer_id).await?;
        Ok(())
    }

    async fn create_checkout_session(
        &self,
        request: &CreateSessionRequest,
    ) -> AppResult<GatewayCheckoutSession> {
        let session = self
            .client
            .create_checkout_session(
                &request.customer_id,
                &request.price_id,
                request.mode.as_str(),
                &request.success_url,
                &request.cancel_url,
                &request.user_id.to_string(),
            )
            .await?;
        Ok(GatewayCheckoutSession {
            id: session.id,
            url: session.url,
        })
    }

    async fn list_subscriptions(&self, customer_id: &str) -> AppResult<Vec<GatewaySubscription>> {
        let subscriptions = self.client.list_subscriptions(customer_id).await?;

        Ok(subscriptions
            .into_iter()
            .map(|s| GatewaySubscription {
                price_id: s.price_id(),
                payment_method_brand: s.card_brand(),
                payment_method_last4: s.card_last4(),
                id: s.id,
                status: s.status,
                current_period_start: s.current_period_start,
                current_period_end: s.current_period_end,
                cancel_at_period_end: s.cancel_at_period_end,
            })
            .collect())
    }
}
