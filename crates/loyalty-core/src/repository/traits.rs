//! 仓储 Trait 定义
//!
//! 服务层与对账调度依赖抽象而非具体实现，支持 mock 测试

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::Result;
use crate::models::{Balance, CreditOutcome, Order, StatusUpdate, Withdrawal};

/// 订单仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderRepositoryTrait: Send + Sync {
    /// 查询订单归属用户
    async fn find_owner(&self, number: &str) -> Result<Option<i64>>;

    /// 插入新订单，订单号已存在时不写入并返回 false
    async fn insert_new(&self, order: &Order) -> Result<bool>;

    /// 用户的订单，按上传时间倒序
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Order>>;

    /// 所有 NEW / PROCESSING 订单，按（上传时间, 订单号）正序
    async fn list_pending(&self) -> Result<Vec<Order>>;

    /// 已 PROCESSED 但尚未入账的订单
    async fn list_uncredited(&self) -> Result<Vec<Order>>;

    /// 更新状态与积分，仅对非终态订单生效
    ///
    /// 返回是否实际更新了一行；订单已处于终态时返回 false。
    async fn update_status(&self, update: &StatusUpdate) -> Result<bool>;
}

/// 余额账本接口
///
/// 入账与扣减都是原子操作，同一用户的并发入账和扣减会被串行化。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BalanceLedgerTrait: Send + Sync {
    /// 以订单号为幂等键入账
    async fn credit(
        &self,
        user_id: i64,
        order_number: &str,
        amount: Decimal,
    ) -> Result<CreditOutcome>;

    /// 扣减余额并追加提现记录
    ///
    /// 余额不足返回 `InsufficientFunds`，引用号重复返回 `WithdrawalAlreadyExists`，
    /// 失败时余额与提现记录均不变。
    async fn debit(&self, user_id: i64, order_number: &str, sum: Decimal) -> Result<Withdrawal>;

    /// 没有余额行时返回零余额
    async fn get_balance(&self, user_id: i64) -> Result<Balance>;

    /// 用户的提现记录，按处理时间倒序
    async fn list_withdrawals(&self, user_id: i64) -> Result<Vec<Withdrawal>>;
}
