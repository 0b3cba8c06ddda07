//! 订单仓储（PostgreSQL）

use async_trait::async_trait;
use sqlx::PgPool;

use super::traits::OrderRepositoryTrait;
use crate::error::Result;
use crate::models::{Order, StatusUpdate};

const ORDER_COLUMNS: &str = "number, user_id, status, accrual, uploaded_at, updated_at";

/// 订单仓储
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepositoryTrait for PgOrderRepository {
    async fn find_owner(&self, number: &str) -> Result<Option<i64>> {
        let owner = sqlx::query_scalar::<_, i64>("SELECT user_id FROM orders WHERE number = $1")
            .bind(number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(owner)
    }

    async fn insert_new(&self, order: &Order) -> Result<bool> {
        // 订单号主键是唯一性的最终裁决，冲突时由调用方重新读取归属
        let result = sqlx::query(
            r#"
            INSERT INTO orders (number, user_id, status, accrual, uploaded_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (number) DO NOTHING
            "#,
        )
        .bind(&order.number)
        .bind(order.user_id)
        .bind(order.status)
        .bind(order.accrual)
        .bind(order.uploaded_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY uploaded_at DESC, number"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    async fn list_pending(&self) -> Result<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE status IN ('NEW', 'PROCESSING')
            ORDER BY uploaded_at ASC, number ASC
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    async fn list_uncredited(&self) -> Result<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT o.number, o.user_id, o.status, o.accrual, o.uploaded_at, o.updated_at
            FROM orders o
            LEFT JOIN accrual_credits c ON c.order_number = o.number
            WHERE o.status = 'PROCESSED' AND c.order_number IS NULL
            ORDER BY o.updated_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    async fn update_status(&self, update: &StatusUpdate) -> Result<bool> {
        // 条件更新：终态订单不会被覆盖
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, accrual = $3, updated_at = NOW()
            WHERE number = $1 AND status IN ('NEW', 'PROCESSING')
            "#,
        )
        .bind(&update.number)
        .bind(update.status)
        .bind(update.accrual)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
