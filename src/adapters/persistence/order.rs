use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::billing::{CreateOrderInput, OrderProfile, OrderRepo},
};

fn row_to_profile(row: &sqlx::postgres::PgRow) -> OrderProfile {
    OrderProfile {
        id: row.get("id"),
        checkout_session_id: row.get("checkout_session_id"),
        payment_intent_id: row.get("payment_intent_id"),
        customer_id: row.get("customer_id"),
        user_id: row.get("user_id"),
        amount_subtotal: row.get("amount_subtotal"),
        amount_total: row.get("amount_total"),
        currency: row.get("currency"),
        payment_status: row.get("payment_status"),
        status: row.get("status"),
        created_at: row.get("created_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, checkout_session_id, payment_intent_id, customer_id, user_id,
    amount_subtotal, amount_total, currency, payment_status, status, created_at
"#;

#[async_trait]
impl OrderRepo for PostgresPersistence {
    async fn insert(&self, input: &CreateOrderInput) -> AppResult<OrderProfile> {
        let id = Uuid::new_v4();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO stripe_orders
                (id, checkout_session_id, payment_intent_id, customer_id, user_id,
                 amount_subtotal, amount_total, currency, payment_status, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(&input.checkout_session_id)
        .bind(&input.payment_intent_id)
        .bind(&input.customer_id)
        .bind(input.user_id)
        .bind(input.amount_subtotal)
        .bind(input.amount_total)
        .bind(&input.currency)
        .bind(&input.payment_status)
        .bind(input.status)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_profile(&row))
    }

    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<OrderProfile>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM stripe_orders WHERE user_id = $1 ORDER BY created_at DESC",
            SELECT_COLS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_profile).collect())
    }

    async fn count_completed_by_user(&self, user_id: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM stripe_orders
            WHERE user_id = $1 AND status = 'completed'
              AND (payment_status IS NULL OR payment_status <> 'unpaid')
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(count)
    }
}
