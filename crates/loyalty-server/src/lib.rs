//! 积分服务接入层
//!
//! 对外提供用户订单上传、余额查询与积分抵扣的 REST API，并在后台运行
//! 订单对账 worker。
//!
//! ## 模块结构
//!
//! - `auth`: JWT 校验
//! - `middleware`: 认证中间件
//! - `dto`: 请求和响应的数据传输对象
//! - `handlers`: HTTP 请求处理器
//! - `routes`: 路由配置
//! - `state`: 应用状态
//! - `worker`: 对账 worker
//!
//! ## 技术栈
//!
//! - Web 框架：Axum
//! - 认证：jsonwebtoken (HS256)

pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod worker;

pub use error::{ApiError, Result};
pub use state::AppState;
