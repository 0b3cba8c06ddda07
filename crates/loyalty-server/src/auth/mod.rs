//! 认证模块
//!
//! 提供 JWT Token 校验功能

mod jwt;

pub use jwt::{Claims, JwtConfig, JwtManager};
