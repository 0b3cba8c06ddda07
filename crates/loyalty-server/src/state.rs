//! 应用状态定义
//!
//! 包含 Axum 路由共享的应用状态

use std::sync::Arc;

use loyalty_core::{OrderService, WithdrawalService};
use loyalty_shared::database::Database;

use crate::auth::JwtManager;

/// Axum 应用共享状态
///
/// 服务在启动时构造一次，通过 Arc 在 handler 间共享
#[derive(Clone)]
pub struct AppState {
    pub order_service: Arc<OrderService>,
    pub withdrawal_service: Arc<WithdrawalService>,
    pub jwt_manager: Arc<JwtManager>,
    /// 就绪探针使用；内存模式（测试）下为空
    pub database: Option<Database>,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(
        order_service: Arc<OrderService>,
        withdrawal_service: Arc<WithdrawalService>,
        jwt_manager: Arc<JwtManager>,
    ) -> Self {
        Self {
            order_service,
            withdrawal_service,
            jwt_manager,
            database: None,
        }
    }

    pub fn with_database(mut self, database: Database) -> Self {
        self.database = Some(database);
        self
    }
}
