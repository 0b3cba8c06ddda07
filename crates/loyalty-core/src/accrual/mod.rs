//! 外部积分计算系统（Accrual）
//!
//! 对账流程只依赖 [`AccrualOracle`] 抽象，生产环境使用 HTTP 客户端，
//! 测试中可以替换为脚本化实现或 mockall 生成的 mock。

mod client;
mod dto;

pub use client::HttpAccrualClient;
pub use dto::AccrualResponse;

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;

use crate::models::AccrualStatus;

/// 积分计算系统对单个订单的答复
#[derive(Debug, Clone, PartialEq)]
pub struct AccrualResult {
    pub order: String,
    pub status: AccrualStatus,
    /// 仅 PROCESSED 时有值，已规整为两位小数
    pub accrual: Option<Decimal>,
}

impl AccrualResult {
    pub fn processed(order: impl Into<String>, accrual: Decimal) -> Self {
        Self {
            order: order.into(),
            status: AccrualStatus::Processed,
            accrual: Some(accrual),
        }
    }

    pub fn with_status(order: impl Into<String>, status: AccrualStatus) -> Self {
        Self {
            order: order.into(),
            status,
            accrual: None,
        }
    }
}

/// 积分计算系统调用错误
#[derive(Debug, Error)]
pub enum AccrualError {
    #[error("请求超时")]
    Timeout,

    #[error("请求失败: {0}")]
    Transport(String),

    #[error("请求过于频繁, retry_after={retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("非预期的响应状态码: {0}")]
    UnexpectedStatus(u16),

    #[error("响应解析失败: {0}")]
    Decode(String),

    #[error("未知的订单状态: {0}")]
    UnknownStatus(String),

    #[error("积分值无效: order={order}, {reason}")]
    InvalidAccrual { order: String, reason: String },
}

impl AccrualError {
    /// 临时性故障，下一轮对账自然重试
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Transport(_) | Self::RateLimited { .. } => true,
            Self::UnexpectedStatus(code) => *code >= 500,
            _ => false,
        }
    }

    /// 指标与日志使用的简短分类
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Transport(_) => "transport",
            Self::RateLimited { .. } => "rate_limited",
            Self::UnexpectedStatus(_) => "unexpected_status",
            Self::Decode(_) => "decode",
            Self::UnknownStatus(_) => "unknown_status",
            Self::InvalidAccrual { .. } => "invalid_accrual",
        }
    }
}

/// 积分计算系统查询接口
///
/// `Ok(None)` 表示对方暂无该订单信息（HTTP 204），不是错误。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccrualOracle: Send + Sync {
    async fn query(&self, number: &str) -> Result<Option<AccrualResult>, AccrualError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(AccrualError::Timeout.is_transient());
        assert!(AccrualError::RateLimited { retry_after: None }.is_transient());
        assert!(AccrualError::UnexpectedStatus(503).is_transient());
        assert!(!AccrualError::UnexpectedStatus(404).is_transient());
        assert!(!AccrualError::UnknownStatus("DONE".to_string()).is_transient());
    }

    #[tokio::test]
    async fn test_mock_oracle() {
        let mut oracle = MockAccrualOracle::new();
        oracle
            .expect_query()
            .withf(|n| n == "79927398713")
            .returning(|n| Ok(Some(AccrualResult::processed(n, Decimal::new(500, 0)))));

        let result = oracle.query("79927398713").await.unwrap().unwrap();
        assert_eq!(result.status, AccrualStatus::Processed);
        assert_eq!(result.accrual, Some(Decimal::new(500, 0)));
    }
}
