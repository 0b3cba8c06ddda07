//! 模拟数据模型

mod accrual;

pub use accrual::{MockAccrual, MockAccrualStatus};
