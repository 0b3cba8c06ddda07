//! 积分余额模型

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 用户积分余额
///
/// `current` 不会为负，`withdrawn` 只增不减。用户没有余额行时视为零余额。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Balance {
    pub user_id: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub current: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub withdrawn: Decimal,
}

impl Balance {
    pub fn zero(user_id: i64) -> Self {
        Self {
            user_id,
            current: Decimal::ZERO,
            withdrawn: Decimal::ZERO,
        }
    }
}

/// 入账结果
///
/// 每笔入账以订单号为幂等键，重复入账返回 `AlreadyApplied` 且不改变余额。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditOutcome {
    Applied,
    AlreadyApplied,
}

impl CreditOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}
