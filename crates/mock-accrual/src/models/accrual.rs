//! 积分计算结果模型
//!
//! JSON 结构与真实积分计算系统一致：`{order, status, accrual?}`

use rand::Rng;
use serde::{Deserialize, Serialize};

/// 订单计算状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MockAccrualStatus {
    Registered,
    Processing,
    Invalid,
    Processed,
}

impl MockAccrualStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Invalid | Self::Processed)
    }
}

/// 订单计算结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockAccrual {
    #[serde(default)]
    pub order: String,
    pub status: MockAccrualStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accrual: Option<f64>,
}

impl MockAccrual {
    pub fn registered(order: impl Into<String>) -> Self {
        Self {
            order: order.into(),
            status: MockAccrualStatus::Registered,
            accrual: None,
        }
    }

    pub fn processed(order: impl Into<String>, accrual: f64) -> Self {
        Self {
            order: order.into(),
            status: MockAccrualStatus::Processed,
            accrual: Some(accrual),
        }
    }

    pub fn with_status(order: impl Into<String>, status: MockAccrualStatus) -> Self {
        Self {
            order: order.into(),
            status,
            accrual: None,
        }
    }

    /// 推进一步：REGISTERED -> PROCESSING -> 随机终态
    ///
    /// 终态中约 80% 为 PROCESSED（积分 0.01 ~ 1000.00），其余为 INVALID。
    pub fn advance<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        match self.status {
            MockAccrualStatus::Registered => self.status = MockAccrualStatus::Processing,
            MockAccrualStatus::Processing => {
                if rng.random_bool(0.8) {
                    let cents: u32 = rng.random_range(1..=100_000);
                    self.status = MockAccrualStatus::Processed;
                    self.accrual = Some(f64::from(cents) / 100.0);
                } else {
                    self.status = MockAccrualStatus::Invalid;
                }
            }
            MockAccrualStatus::Invalid | MockAccrualStatus::Processed => {}
        }
    }
}
