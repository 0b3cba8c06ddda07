//! 订单模型

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::OrderStatus;

/// 用户上传的订单
///
/// `accrual` 仅在 `status == PROCESSED` 时有值。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub number: String,
    pub user_id: i64,
    pub status: OrderStatus,
    #[serde(with = "rust_decimal::serde::float_option", default)]
    pub accrual: Option<Decimal>,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// 新上传的订单，状态为 NEW
    pub fn new(number: impl Into<String>, user_id: i64) -> Self {
        let now = Utc::now();
        Self {
            number: number.into(),
            user_id,
            status: OrderStatus::New,
            accrual: None,
            uploaded_at: now,
            updated_at: now,
        }
    }
}

/// 订单状态变更
///
/// 由对账结果生成，仓储层只对非终态订单生效。
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub number: String,
    pub status: OrderStatus,
    pub accrual: Option<Decimal>,
}
