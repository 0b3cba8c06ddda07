//! Mock Accrual
//!
//! 模拟外部积分计算系统，用于本地开发和客户端测试。
//!
//! # 主要模块
//!
//! - `models`: 积分计算结果模型
//! - `store`: 内存存储实现
//! - `services`: `GET/PUT /api/orders/{number}` 接口
//! - `cli`: 命令行参数
//!
//! # 使用示例
//!
//! ```rust
//! use std::sync::Arc;
//! use mock_accrual::models::MockAccrual;
//! use mock_accrual::services::{AccrualServiceState, Mode};
//!
//! let state = Arc::new(AccrualServiceState::new(Mode::Scripted));
//! state.script(MockAccrual::processed("79927398713", 500.0));
//! let app = mock_accrual::app(state);
//! ```

pub mod cli;
pub mod models;
pub mod services;
pub mod store;

use std::sync::Arc;

use axum::{Router, routing::get};

use services::{AccrualServiceState, accrual_routes};

/// 构建完整的 Mock 应用（业务路由 + 健康检查）
pub fn app(state: Arc<AccrualServiceState>) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .merge(accrual_routes().with_state(state))
}
