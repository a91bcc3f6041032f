use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::billing::{SubscriptionProfile, SubscriptionRepo, SubscriptionSync},
    domain::entities::subscription::STATUS_NOT_STARTED,
};

fn row_to_profile(row: &sqlx::postgres::PgRow) -> SubscriptionProfile {
    SubscriptionProfile {
        id: row.get("id"),
        customer_id: row.get("customer_id"),
        subscription_id: row.get("subscription_id"),
        price_id: row.get("price_id"),
        current_period_start: row.get("current_period_start"),
        current_period_end: row.get("current_period_end"),
        cancel_at_period_end: row.get("cancel_at_period_end"),
        payment_method_brand: row.get("payment_method_brand"),
        payment_method_last4: row.get("payment_method_last4"),
        status: row.get("status"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, customer_id, subscription_id, price_id,
    current_period_start, current_period_end, cancel_at_period_end,
    payment_method_brand, payment_method_last4, status, created_at, updated_at
"#;

#[async_trait]
impl SubscriptionRepo for PostgresPersistence {
    async fn get_by_customer_id(
        &self,
        customer_id: &str,
    ) -> AppResult<Option<SubscriptionProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM stripe_subscriptions WHERE customer_id = $1",
            SELECT_COLS
        ))
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_profile))
    }

    async fn insert_placeholder(&self, customer_id: &str) -> AppResult<SubscriptionProfile> {
        let id = Uuid::new_v4();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO stripe_subscriptions (id, customer_id, status)
            VALUES ($1, $2, $3)
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(customer_id)
        .bind(STATUS_NOT_STARTED)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_profile(&row))
    }

    async fn mark_not_started(&self, customer_id: &str) -> AppResult<SubscriptionProfile> {
        let id = Uuid::new_v4();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO stripe_subscriptions (id, customer_id, status)
            VALUES ($1, $2, $3)
            ON CONFLICT (customer_id) DO UPDATE SET
                status = EXCLUDED.status,
                updated_at = CURRENT_TIMESTAMP
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(customer_id)
        .bind(STATUS_NOT_STARTED)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_profile(&row))
    }

    async fn upsert_from_gateway(&self, sync: &SubscriptionSync) -> AppResult<SubscriptionProfile> {
        let id = Uuid::new_v4();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO stripe_subscriptions
                (id, customer_id, subscription_id, price_id,
                 current_period_start, current_period_end, cancel_at_period_end,
                 payment_method_brand, payment_method_last4, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (customer_id) DO UPDATE SET
                subscription_id = EXCLUDED.subscription_id,
                price_id = EXCLUDED.price_id,
                current_period_start = EXCLUDED.current_period_start,
                current_period_end = EXCLUDED.current_period_end,
                cancel_at_period_end = EXCLUDED.cancel_at_period_end,
                payment_method_brand = EXCLUDED.payment_method_brand,
                payment_method_last4 = EXCLUDED.payment_method_last4,
                status = EXCLUDED.status,
                updated_at = CURRENT_TIMESTAMP
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(&sync.customer_id)
        .bind(&sync.subscription_id)
        .bind(&sync.price_id)
        .bind(sync.current_period_start)
        .bind(sync.current_period_end)
        .bind(sync.cancel_at_period_end)
        .bind(&sync.payment_method_brand)
        .bind(&sync.payment_method_last4)
        .bind(&sync.status)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_profile(&row))
    }

    async fn delete_by_customer_id(&self, customer_id: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM stripe_subscriptions WHERE customer_id = $1")
            .bind(customer_id)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }
}
