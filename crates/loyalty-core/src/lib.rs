//! 积分订单核心库
//!
//! 负责订单生命周期、与外部积分计算系统（Accrual）的对账结果落库，以及
//! 用户积分账本的入账与提现。HTTP 接入层和后台调度在 `loyalty-server` 中。
//!
//! ## 模块结构
//!
//! - `models`: 领域模型（订单、余额、提现记录）
//! - `error`: 错误类型定义
//! - `validation`: 订单号格式与 Luhn 校验
//! - `repository`: 订单仓储与余额账本（trait + PostgreSQL 实现）
//! - `accrual`: 外部积分计算系统客户端
//! - `service`: 订单生命周期与提现服务
//! - `test_utils`: 内存版仓储与脚本化 Oracle（测试用）

pub mod accrual;
pub mod error;
pub mod models;
pub mod repository;
pub mod service;
pub mod validation;

pub mod test_utils;

pub use accrual::{AccrualError, AccrualOracle, AccrualResult, HttpAccrualClient};
pub use error::{LoyaltyError, Result};
pub use models::*;
pub use repository::{
    BalanceLedgerTrait, OrderRepositoryTrait, PgBalanceLedger, PgOrderRepository,
};
pub use service::{OrderService, TransitionOutcome, WithdrawalService};
pub use validation::{MAX_ORDER_NUMBER_LEN, is_valid_luhn, validate_order_number};
