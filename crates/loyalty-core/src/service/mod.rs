//! 业务服务层
//!
//! - `OrderService`: 订单上传准入与状态迁移（订单状态的唯一写入方）
//! - `WithdrawalService`: 提现与余额查询

mod order_service;
mod withdrawal_service;

pub use order_service::{OrderService, TransitionOutcome};
pub use withdrawal_service::WithdrawalService;
