//! JWT 认证中间件
//!
//! 验证请求中的 Bearer Token 并将调用方身份注入请求扩展

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::state::AppState;

/// 已认证的调用方（数字用户 ID）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub i64);

/// 认证中间件
///
/// 只挂载在 `/api/user` 路由上，探针接口不经过这里。
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let Some(token) = token else {
        return ApiError::Unauthorized("缺少认证 Token".to_string()).into_response();
    };

    let user_id = match state
        .jwt_manager
        .verify_token(token)
        .and_then(|claims| claims.user_id())
    {
        Ok(user_id) => user_id,
        Err(e) => return e.into_response(),
    };

    request.extensions_mut().insert(AuthUser(user_id));
    next.run(request).await
}
