//! 积分服务错误类型
//!
//! 定义服务层的业务错误和系统错误

use rust_decimal::Decimal;
use thiserror::Error;

use crate::accrual::AccrualError;
use crate::models::OrderStatus;

/// 积分服务错误类型
#[derive(Debug, Error)]
pub enum LoyaltyError {
    // === 校验错误 ===
    #[error("订单号格式错误: {0}")]
    InvalidOrderNumber(String),

    #[error("提现金额必须大于 0: {0}")]
    InvalidSum(Decimal),

    // === 冲突错误 ===
    #[error("订单已由当前用户上传: {0}")]
    OrderAlreadyExists(String),

    #[error("订单已被其他用户上传: {0}")]
    OrderOwnedByOther(String),

    #[error("提现引用号已使用: {0}")]
    WithdrawalAlreadyExists(String),

    #[error("非法的订单状态迁移: order={number}, {from} -> {to}")]
    IllegalTransition {
        number: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    // === 余额错误 ===
    #[error("积分余额不足: 需要 {required}, 可用 {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    // === 外部服务错误 ===
    #[error("积分计算系统错误: {0}")]
    Accrual(#[from] AccrualError),

    // === 系统错误 ===
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("持久化失败: {0}")]
    Persistence(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, LoyaltyError>;

impl LoyaltyError {
    /// 是否可重试（下一轮对账或客户端重试可能成功）
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(_) | Self::Persistence(_) => true,
            Self::Accrual(e) => e.is_transient(),
            _ => false,
        }
    }

    /// 是否为业务错误（调用方需要修正输入，不是系统故障）
    pub fn is_business_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidOrderNumber(_)
                | Self::InvalidSum(_)
                | Self::OrderAlreadyExists(_)
                | Self::OrderOwnedByOther(_)
                | Self::WithdrawalAlreadyExists(_)
                | Self::InsufficientFunds { .. }
        )
    }

    /// 获取错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidOrderNumber(_) => "INVALID_ORDER_NUMBER",
            Self::InvalidSum(_) => "INVALID_SUM",
            Self::OrderAlreadyExists(_) => "ORDER_ALREADY_EXISTS",
            Self::OrderOwnedByOther(_) => "ORDER_OWNED_BY_OTHER",
            Self::WithdrawalAlreadyExists(_) => "WITHDRAWAL_ALREADY_EXISTS",
            Self::IllegalTransition { .. } => "ILLEGAL_TRANSITION",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::Accrual(_) => "ACCRUAL_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_retryable() {
        assert!(LoyaltyError::Database(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(LoyaltyError::Accrual(AccrualError::Timeout).is_retryable());
        assert!(
            !LoyaltyError::Accrual(AccrualError::UnknownStatus("DONE".to_string())).is_retryable()
        );
        assert!(!LoyaltyError::InvalidOrderNumber("12a".to_string()).is_retryable());
    }

    #[test]
    fn test_error_is_business_error() {
        assert!(LoyaltyError::OrderOwnedByOther("79927398713".to_string()).is_business_error());
        assert!(
            LoyaltyError::InsufficientFunds {
                required: Decimal::new(100, 0),
                available: Decimal::new(50, 0),
            }
            .is_business_error()
        );
        assert!(!LoyaltyError::Persistence("closed".to_string()).is_business_error());
        assert!(
            !LoyaltyError::IllegalTransition {
                number: "79927398713".to_string(),
                from: OrderStatus::Processed,
                to: OrderStatus::Processing,
            }
            .is_business_error()
        );
    }

    #[test]
    fn test_error_code() {
        assert_eq!(
            LoyaltyError::InvalidOrderNumber("1".to_string()).error_code(),
            "INVALID_ORDER_NUMBER"
        );
        assert_eq!(
            LoyaltyError::InsufficientFunds {
                required: Decimal::ONE,
                available: Decimal::ZERO,
            }
            .error_code(),
            "INSUFFICIENT_FUNDS"
        );
    }

    #[test]
    fn test_error_display() {
        let err = LoyaltyError::IllegalTransition {
            number: "79927398713".to_string(),
            from: OrderStatus::Invalid,
            to: OrderStatus::Processed,
        };
        assert_eq!(
            err.to_string(),
            "非法的订单状态迁移: order=79927398713, INVALID -> PROCESSED"
        );
    }
}
