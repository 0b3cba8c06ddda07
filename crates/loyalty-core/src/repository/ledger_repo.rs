//! 余额账本（PostgreSQL）
//!
//! 余额行 `user_balances` 是同一用户所有入账与扣减的串行化点：
//! 入账通过 upsert 获取行锁，扣减通过 `SELECT ... FOR UPDATE` 获取行锁。

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, instrument};

use super::is_unique_violation;
use super::traits::BalanceLedgerTrait;
use crate::error::{LoyaltyError, Result};
use crate::models::{Balance, CreditOutcome, Withdrawal};

/// 余额账本
pub struct PgBalanceLedger {
    pool: PgPool,
}

impl PgBalanceLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct LockedBalance {
    current_balance: Decimal,
}

#[async_trait]
impl BalanceLedgerTrait for PgBalanceLedger {
    /// 入账
    ///
    /// 同一事务内先写入 `accrual_credits`（订单号主键），只有首次写入成功时才累加余额。
    #[instrument(skip(self))]
    async fn credit(
        &self,
        user_id: i64,
        order_number: &str,
        amount: Decimal,
    ) -> Result<CreditOutcome> {
        if amount < Decimal::ZERO {
            return Err(LoyaltyError::InvalidSum(amount));
        }

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO accrual_credits (order_number, user_id, amount)
            VALUES ($1, $2, $3)
            ON CONFLICT (order_number) DO NOTHING
            "#,
        )
        .bind(order_number)
        .bind(user_id)
        .bind(amount)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            debug!("订单已入账，跳过");
            return Ok(CreditOutcome::AlreadyApplied);
        }

        sqlx::query(
            r#"
            INSERT INTO user_balances (user_id, current_balance, total_withdrawn)
            VALUES ($1, $2, 0)
            ON CONFLICT (user_id) DO UPDATE
            SET current_balance = user_balances.current_balance + EXCLUDED.current_balance,
                updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(CreditOutcome::Applied)
    }

    /// 扣减
    ///
    /// 1. 确保余额行存在 -> 2. FOR UPDATE 锁定 -> 3. 校验余额
    /// -> 4. 写入提现记录 -> 5. 扣减余额、累加已提现
    #[instrument(skip(self))]
    async fn debit(&self, user_id: i64, order_number: &str, sum: Decimal) -> Result<Withdrawal> {
        if sum <= Decimal::ZERO {
            return Err(LoyaltyError::InvalidSum(sum));
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO user_balances (user_id, current_balance, total_withdrawn)
            VALUES ($1, 0, 0)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let locked = sqlx::query_as::<_, LockedBalance>(
            "SELECT current_balance FROM user_balances WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        if locked.current_balance < sum {
            tx.rollback().await?;
            return Err(LoyaltyError::InsufficientFunds {
                required: sum,
                available: locked.current_balance,
            });
        }

        let withdrawal = sqlx::query_as::<_, Withdrawal>(
            r#"
            INSERT INTO withdrawals (user_id, order_number, sum, processed_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING id, user_id, order_number, sum, processed_at
            "#,
        )
        .bind(user_id)
        .bind(order_number)
        .bind(sum)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                LoyaltyError::WithdrawalAlreadyExists(order_number.to_string())
            } else {
                LoyaltyError::Database(e)
            }
        })?;

        sqlx::query(
            r#"
            UPDATE user_balances
            SET current_balance = current_balance - $2,
                total_withdrawn = total_withdrawn + $2,
                updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(sum)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(withdrawal)
    }

    async fn get_balance(&self, user_id: i64) -> Result<Balance> {
        let balance = sqlx::query_as::<_, Balance>(
            r#"
            SELECT user_id, current_balance AS current, total_withdrawn AS withdrawn
            FROM user_balances
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(balance.unwrap_or_else(|| Balance::zero(user_id)))
    }

    async fn list_withdrawals(&self, user_id: i64) -> Result<Vec<Withdrawal>> {
        let withdrawals = sqlx::query_as::<_, Withdrawal>(
            r#"
            SELECT id, user_id, order_number, sum, processed_at
            FROM withdrawals
            WHERE user_id = $1
            ORDER BY processed_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(withdrawals)
    }
}
