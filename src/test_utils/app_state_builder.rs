//! Test app state builder for HTTP-level integration testing.
//!
//! Creates a minimal `AppState` backed by the in-memory mocks. The builder
//! hands out `Arc` clones of each mock so tests can seed state up front and
//! assert on writes afterwards.

use std::sync::Arc;

use secrecy::SecretString;

use crate::{
    adapters::http::app_state::AppState,
    application::use_cases::billing::BillingUseCases,
    infra::config::AppConfig,
    test_utils::{
        InMemoryCustomerMappingRepo, InMemoryOrderRepo, InMemorySubscriptionRepo,
        MockPaymentGateway, TEST_JWT_SECRET, TEST_WEBHOOK_SECRET,
    },
};

pub struct TestAppStateBuilder {
    customers: Arc<InMemoryCustomerMappingRepo>,
    orders: Arc<InMemoryOrderRepo>,
    subscriptions: Arc<InMemorySubscriptionRepo>,
    gateway: Arc<MockPaymentGateway>,
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self {
            customers: Arc::new(InMemoryCustomerMappingRepo::new()),
            orders: Arc::new(InMemoryOrderRepo::new()),
            subscriptions: Arc::new(InMemorySubscriptionRepo::new()),
            gateway: Arc::new(MockPaymentGateway::new()),
        }
    }

    pub fn customers(&self) -> Arc<InMemoryCustomerMappingRepo> {
        self.customers.clone()
    }

    pub fn orders(&self) -> Arc<InMemoryOrderRepo> {
        self.orders.clone()
    }

    pub fn subscriptions(&self) -> Arc<InMemorySubscriptionRepo> {
        self.subscriptions.clone()
    }

    pub fn gateway(&self) -> Arc<MockPaymentGateway> {
        self.gateway.clone()
    }

    /// Build the AppState with all configured mocks.
    pub fn build(self) -> AppState {
        let billing_use_cases = BillingUseCases::new(
            self.customers,
            self.orders,
            self.subscriptions,
            self.gateway,
        );

        // Create minimal config for testing
        let config = Arc::new(AppConfig {
            bind_addr: "127.0.0.1:3001".parse().unwrap(),
            database_url: String::new(),
            jwt_secret: SecretString::new(TEST_JWT_SECRET.into()),
            stripe_secret_key: SecretString::new("sk_test_dummy".into()),
            stripe_webhook_secret: SecretString::new(TEST_WEBHOOK_SECRET.into()),
        });

        AppState {
            config,
            billing_use_cases: Arc::new(billing_use_cases),
        }
    }
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
