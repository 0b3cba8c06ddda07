//! 数据库仓储层
//!
//! 订单仓储与余额账本的数据访问接口，封装 SQL 操作细节。
//!
//! ## 设计原则
//!
//! - 订单仓储只负责持久化，状态迁移规则由 `OrderService` 决定
//! - 余额的每一次变动都在账本内部的单个事务中完成，外部不能直接写余额
//! - 订单号唯一性、提现引用号唯一性由数据库约束兜底
//! - 定义 trait 接口以支持 mock 测试

mod ledger_repo;
mod order_repo;
mod traits;

pub use ledger_repo::PgBalanceLedger;
pub use order_repo::PgOrderRepository;
pub use traits::*;

/// 是否为唯一约束冲突
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}
