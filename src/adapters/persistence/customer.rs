use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::billing::{CustomerMappingProfile, CustomerMappingRepo},
};

fn row_to_profile(row: &sqlx::postgres::PgRow) -> CustomerMappingProfile {
    CustomerMappingProfile {
        id: row.get("id"),
        user_id: row.get("user_id"),
        customer_id: row.get("customer_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        deleted_at: row.get("deleted_at"),
    }
}

const SELECT_COLS: &str = "id, user_id, customer_id, created_at, updated_at, deleted_at";

#[async_trait]
impl CustomerMappingRepo for PostgresPersistence {
    async fn get_by_user_id(&self, user_id: Uuid) -> AppResult<Option<CustomerMappingProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM stripe_customers WHERE user_id = $1 AND deleted_at IS NULL",
            SELECT_COLS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_profile))
    }

    async fn insert(&self, user_id: Uuid, customer_id: &str) -> AppResult<CustomerMappingProfile> {
        let id = Uuid::new_v4();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO stripe_customers (id, user_id, customer_id)
            VALUES ($1, $2, $3)
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(user_id)
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_profile(&row))
    }
}
