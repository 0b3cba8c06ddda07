//! 提现记录模型

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 提现记录
///
/// 每次成功扣减对应一条，只追加不修改。`order_number` 是支付引用号，
/// 不要求对应本系统中的订单。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Withdrawal {
    pub id: i64,
    pub user_id: i64,
    pub order_number: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub sum: Decimal,
    pub processed_at: DateTime<Utc>,
}
