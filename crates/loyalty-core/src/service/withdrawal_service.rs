//! 提现服务
//!
//! 用积分抵扣支付：校验引用号与金额后交由余额账本原子扣减。
//! 账本返回的系统错误统一报告为持久化失败，不向调用方暴露细节。

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{error, info, instrument};

use crate::error::{LoyaltyError, Result};
use crate::models::{Balance, Withdrawal, round_amount};
use crate::repository::BalanceLedgerTrait;
use crate::validation::validate_order_number;

/// 提现服务
pub struct WithdrawalService {
    ledger: Arc<dyn BalanceLedgerTrait>,
}

impl WithdrawalService {
    pub fn new(ledger: Arc<dyn BalanceLedgerTrait>) -> Self {
        Self { ledger }
    }

    /// 提现
    ///
    /// `order_number` 是支付引用号，只做 Luhn 校验，不要求对应已上传的订单。
    #[instrument(skip(self, raw_order_number))]
    pub async fn withdraw(
        &self,
        user_id: i64,
        raw_order_number: &str,
        sum: Decimal,
    ) -> Result<Withdrawal> {
        let order_number = validate_order_number(raw_order_number)?;

        let sum = round_amount(sum);
        if sum <= Decimal::ZERO {
            return Err(LoyaltyError::InvalidSum(sum));
        }

        match self.ledger.debit(user_id, &order_number, sum).await {
            Ok(withdrawal) => {
                info!(order = %order_number, %sum, "提现成功");
                Ok(withdrawal)
            }
            Err(
                e @ (LoyaltyError::InsufficientFunds { .. }
                | LoyaltyError::WithdrawalAlreadyExists(_)
                | LoyaltyError::InvalidSum(_)),
            ) => Err(e),
            Err(e) => {
                error!(order = %order_number, error = %e, "提现写入失败");
                Err(LoyaltyError::Persistence(format!("提现失败: {}", e.error_code())))
            }
        }
    }

    /// 用户的提现记录，按处理时间倒序
    pub async fn list_withdrawals(&self, user_id: i64) -> Result<Vec<Withdrawal>> {
        self.ledger.list_withdrawals(user_id).await
    }

    /// 用户的当前余额与累计提现
    pub async fn get_balance(&self, user_id: i64) -> Result<Balance> {
        self.ledger.get_balance(user_id).await
    }
}
