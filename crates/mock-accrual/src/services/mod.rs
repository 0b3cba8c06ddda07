//! Mock 服务实现

mod accrual_service;

pub use accrual_service::{AccrualServiceState, Mode, RateLimiter, accrual_routes};
