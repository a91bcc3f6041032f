//! In-memory mock implementations for the billing repository traits and the
//! payment gateway port.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::{
        CreateSessionRequest, GatewayCheckoutSession, GatewayCustomer, GatewaySubscription,
        PaymentGateway,
    },
    application::use_cases::billing::{
        CreateOrderInput, CustomerMappingProfile, CustomerMappingRepo, OrderProfile, OrderRepo,
        SubscriptionProfile, SubscriptionRepo, SubscriptionSync,
    },
    domain::entities::subscription::STATUS_NOT_STARTED,
};

use super::factories::test_datetime;

// ============================================================================
// InMemoryCustomerMappingRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryCustomerMappingRepo {
    pub mappings: Mutex<Vec<CustomerMappingProfile>>,
    fail_inserts: AtomicBool,
}

impl InMemoryCustomerMappingRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every insert fail, to exercise the compensation path.
    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Insert a mapping directly, bypassing the repo trait.
    pub fn seed(&self, user_id: Uuid, customer_id: &str) {
        self.mappings.lock().unwrap().push(CustomerMappingProfile {
            id: Uuid::new_v4(),
            user_id,
            customer_id: customer_id.to_string(),
            created_at: Some(test_datetime()),
            updated_at: Some(test_datetime()),
            deleted_at: None,
        });
    }

    pub fn count(&self) -> usize {
        self.mappings.lock().unwrap().len()
    }

    pub fn get_for_user(&self, user_id: Uuid) -> Option<CustomerMappingProfile> {
        self.mappings
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.user_id == user_id && m.deleted_at.is_none())
            .cloned()
    }
}

#[async_trait]
impl CustomerMappingRepo for InMemoryCustomerMappingRepo {
    async fn get_by_user_id(&self, user_id: Uuid) -> AppResult<Option<CustomerMappingProfile>> {
        Ok(self.get_for_user(user_id))
    }

    async fn insert(&self, user_id: Uuid, customer_id: &str) -> AppResult<CustomerMappingProfile> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(AppError::Database("Database operation failed".into()));
        }

        let mut mappings = self.mappings.lock().unwrap();
        if mappings
            .iter()
            .any(|m| m.user_id == user_id || m.customer_id == customer_id)
        {
            return Err(AppError::InvalidInput(
                "A record with this value already exists".into(),
            ));
        }

        let mapping = CustomerMappingProfile {
            id: Uuid::new_v4(),
            user_id,
            customer_id: customer_id.to_string(),
            created_at: Some(test_datetime()),
            updated_at: Some(test_datetime()),
            deleted_at: None,
        };
        mappings.push(mapping.clone());
        Ok(mapping)
    }
}

// ============================================================================
// InMemoryOrderRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryOrderRepo {
    pub orders: Mutex<Vec<OrderProfile>>,
}

impl InMemoryOrderRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, order: OrderProfile) {
        self.orders.lock().unwrap().push(order);
    }

    pub fn count(&self) -> usize {
        self.orders.lock().unwrap().len()
    }

    pub fn all(&self) -> Vec<OrderProfile> {
        self.orders.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrderRepo for InMemoryOrderRepo {
    async fn insert(&self, input: &CreateOrderInput) -> AppResult<OrderProfile> {
        let mut orders = self.orders.lock().unwrap();

        // Same behavior as the unique constraint on checkout_session_id.
        if orders
            .iter()
            .any(|o| o.checkout_session_id == input.checkout_session_id)
        {
            return Err(AppError::InvalidInput(
                "A record with this value already exists".into(),
            ));
        }

        let order = OrderProfile {
            id: Uuid::new_v4(),
            checkout_session_id: input.checkout_session_id.clone(),
            payment_intent_id: input.payment_intent_id.clone(),
            customer_id: input.customer_id.clone(),
            user_id: input.user_id,
            amount_subtotal: input.amount_subtotal,
            amount_total: input.amount_total,
            currency: input.currency.clone(),
            payment_status: input.payment_status.clone(),
            status: input.status,
            created_at: Some(test_datetime()),
        };
        orders.push(order.clone());
        Ok(order)
    }

    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<OrderProfile>> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn count_completed_by_user(&self, user_id: Uuid) -> AppResult<i64> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .iter()
            .filter(|o| {
                o.user_id == user_id
                    && o.status.as_str() == "completed"
                    && o.payment_status.as_deref() != Some("unpaid")
            })
            .count() as i64)
    }
}

// ============================================================================
// InMemorySubscriptionRepo
// ============================================================================

#[derive(Default)]
pub struct InMemorySubscriptionRepo {
    pub subscriptions: Mutex<HashMap<String, SubscriptionProfile>>,
}

impl InMemorySubscriptionRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, subscription: SubscriptionProfile) {
        self.subscriptions
            .lock()
            .unwrap()
            .insert(subscription.customer_id.clone(), subscription);
    }

    pub fn count(&self) -> usize {
        self.subscriptions.lock().unwrap().len()
    }

    pub fn get(&self, customer_id: &str) -> Option<SubscriptionProfile> {
        self.subscriptions.lock().unwrap().get(customer_id).cloned()
    }

    fn placeholder(customer_id: &str) -> SubscriptionProfile {
        SubscriptionProfile {
            id: Uuid::new_v4(),
            customer_id: customer_id.to_string(),
            subscription_id: None,
            price_id: None,
            current_period_start: None,
            current_period_end: None,
            cancel_at_period_end: false,
            payment_method_brand: None,
            payment_method_last4: None,
            status: STATUS_NOT_STARTED.to_string(),
            created_at: Some(test_datetime()),
            updated_at: Some(test_datetime()),
        }
    }
}

#[async_trait]
impl SubscriptionRepo for InMemorySubscriptionRepo {
    async fn get_by_customer_id(
        &self,
        customer_id: &str,
    ) -> AppResult<Option<SubscriptionProfile>> {
        Ok(self.get(customer_id))
    }

    async fn insert_placeholder(&self, customer_id: &str) -> AppResult<SubscriptionProfile> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        if subscriptions.contains_key(customer_id) {
            return Err(AppError::InvalidInput(
                "A record with this value already exists".into(),
            ));
        }
        let placeholder = Self::placeholder(customer_id);
        subscriptions.insert(customer_id.to_string(), placeholder.clone());
        Ok(placeholder)
    }

    async fn mark_not_started(&self, customer_id: &str) -> AppResult<SubscriptionProfile> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let entry = subscriptions
            .entry(customer_id.to_string())
            .or_insert_with(|| Self::placeholder(customer_id));
        entry.status = STATUS_NOT_STARTED.to_string();
        entry.updated_at = Some(test_datetime());
        Ok(entry.clone())
    }

    async fn upsert_from_gateway(&self, sync: &SubscriptionSync) -> AppResult<SubscriptionProfile> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let entry = subscriptions
            .entry(sync.customer_id.clone())
            .or_insert_with(|| Self::placeholder(&sync.customer_id));
        entry.subscription_id = sync.subscription_id.clone();
        entry.price_id = sync.price_id.clone();
        entry.current_period_start = sync.current_period_start;
        entry.current_period_end = sync.current_period_end;
        entry.cancel_at_period_end = sync.cancel_at_period_end;
        entry.payment_method_brand = sync.payment_method_brand.clone();
        entry.payment_method_last4 = sync.payment_method_last4.clone();
        entry.status = sync.status.clone();
        entry.updated_at = Some(test_datetime());
        Ok(entry.clone())
    }

    async fn delete_by_customer_id(&self, customer_id: &str) -> AppResult<()> {
        self.subscriptions.lock().unwrap().remove(customer_id);
        Ok(())
    }
}

// ============================================================================
// MockPaymentGateway
// ============================================================================

/// In-process stand-in for the payment provider. Records every call and lets
/// tests script the subscription listing and failure modes.
#[derive(Default)]
pub struct MockPaymentGateway {
    customers: Mutex<Vec<GatewayCustomer>>,
    deleted: Mutex<Vec<String>>,
    sessions: Mutex<Vec<CreateSessionRequest>>,
    subscriptions: Mutex<HashMap<String, Vec<GatewaySubscription>>>,
    fail_create_customer: AtomicBool,
    counter: AtomicUsize,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_create_customer(&self, fail: bool) {
        self.fail_create_customer.store(fail, Ordering::SeqCst);
    }

    pub fn set_subscriptions(&self, customer_id: &str, subscriptions: Vec<GatewaySubscription>) {
        self.subscriptions
            .lock()
            .unwrap()
            .insert(customer_id.to_string(), subscriptions);
    }

    pub fn created_customers(&self) -> Vec<GatewayCustomer> {
        self.customers.lock().unwrap().clone()
    }

    pub fn deleted_customers(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn created_sessions(&self) -> Vec<CreateSessionRequest> {
        self.sessions.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_customer(&self, email: &str, _user_id: Uuid) -> AppResult<GatewayCustomer> {
        if self.fail_create_customer.load(Ordering::SeqCst) {
            return Err(AppError::Gateway("customer creation failed".into()));
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let customer = GatewayCustomer {
            id: format!("cus_test_{n}"),
            email: Some(email.to_string()),
        };
        self.customers.lock().unwrap().push(customer.clone());
        Ok(customer)
    }

    async fn delete_customer(&self, customer_id: &str) -> AppResult<()> {
        self.deleted.lock().unwrap().push(customer_id.to_string());
        Ok(())
    }

    async fn create_checkout_session(
        &self,
        request: &CreateSessionRequest,
    ) -> AppResult<GatewayCheckoutSession> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.sessions.lock().unwrap().push(request.clone());
        Ok(GatewayCheckoutSession {
            id: format!("cs_test_{n}"),
            url: Some(format!("https://checkout.stripe.com/c/pay/cs_test_{n}")),
        })
    }

    async fn list_subscriptions(&self, customer_id: &str) -> AppResult<Vec<GatewaySubscription>> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .get(customer_id)
            .cloned()
            .unwrap_or_default())
    }
}
