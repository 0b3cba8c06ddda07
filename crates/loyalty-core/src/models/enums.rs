//! 订单状态枚举
//!
//! 所有枚举都支持数据库（sqlx）和 JSON（serde）序列化

use serde::{Deserialize, Serialize};
use std::fmt;

/// 订单状态
///
/// 状态机：`NEW -> PROCESSING -> {PROCESSED | INVALID}`，NEW 也可以直接进入终态。
/// PROCESSED 与 INVALID 为终态，之后不允许任何变更。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// 已上传，尚未被积分计算系统受理
    #[default]
    New,
    /// 积分计算系统已受理，正在计算
    Processing,
    /// 不参与积分计算（终态）
    Invalid,
    /// 计算完成，积分已确定（终态）
    Processed,
}

impl OrderStatus {
    /// 需要对账的状态
    pub const PENDING: [OrderStatus; 2] = [OrderStatus::New, OrderStatus::Processing];

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Invalid | Self::Processed)
    }

    /// 是否允许从当前状态迁移到 `next`
    ///
    /// 相同状态之间不算迁移，返回 false。
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        match self {
            Self::New => matches!(next, Self::Processing | Self::Invalid | Self::Processed),
            Self::Processing => matches!(next, Self::Invalid | Self::Processed),
            Self::Invalid | Self::Processed => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Processing => "PROCESSING",
            Self::Invalid => "INVALID",
            Self::Processed => "PROCESSED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 积分计算系统返回的订单状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccrualStatus {
    /// 已登记，尚未开始计算
    Registered,
    Processing,
    Invalid,
    Processed,
}

impl AccrualStatus {
    /// 映射为本地订单状态，REGISTERED 视为 PROCESSING
    pub fn order_status(&self) -> OrderStatus {
        match self {
            Self::Registered | Self::Processing => OrderStatus::Processing,
            Self::Invalid => OrderStatus::Invalid,
            Self::Processed => OrderStatus::Processed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "REGISTERED",
            Self::Processing => "PROCESSING",
            Self::Invalid => "INVALID",
            Self::Processed => "PROCESSED",
        }
    }
}

impl std::str::FromStr for AccrualStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REGISTERED" => Ok(Self::Registered),
            "PROCESSING" => Ok(Self::Processing),
            "INVALID" => Ok(Self::Invalid),
            "PROCESSED" => Ok(Self::Processed),
            other => Err(other.to_string()),
        }
    }
}
