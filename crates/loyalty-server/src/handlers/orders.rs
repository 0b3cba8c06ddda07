//! 订单 API 处理器
//!
//! 上传订单号（text/plain 请求体）与查询本人订单

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use loyalty_core::LoyaltyError;
use loyalty_shared::observability::metrics;
use tracing::info;

use crate::{
    dto::OrderDto,
    error::{ApiError, Result},
    middleware::AuthUser,
    state::AppState,
};

/// 上传订单号
///
/// POST /api/user/orders
///
/// - 202 新订单已受理
/// - 200 本人已上传过
/// - 409 已被其他用户上传
/// - 422 订单号格式或校验位错误
pub async fn upload_order(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    body: String,
) -> Result<StatusCode> {
    let raw = body.trim();
    if raw.is_empty() {
        metrics::record_order_submission("invalid");
        return Err(ApiError::BadRequest("订单号不能为空".to_string()));
    }

    match state.order_service.admit(user_id, raw).await {
        Ok(order) => {
            metrics::record_order_submission("accepted");
            info!(user_id, order = %order.number, "订单已受理");
            Ok(StatusCode::ACCEPTED)
        }
        Err(LoyaltyError::OrderAlreadyExists(_)) => {
            metrics::record_order_submission("already_uploaded");
            Ok(StatusCode::OK)
        }
        Err(e) => {
            metrics::record_order_submission(submission_outcome(&e));
            Err(e.into())
        }
    }
}

/// 查询本人订单，按上传时间倒序
///
/// GET /api/user/orders
///
/// 没有订单时返回 204
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Response> {
    let orders = state.order_service.list(user_id).await?;
    if orders.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let items: Vec<OrderDto> = orders.into_iter().map(OrderDto::from).collect();
    Ok(Json(items).into_response())
}

fn submission_outcome(error: &LoyaltyError) -> &'static str {
    match error {
        LoyaltyError::InvalidOrderNumber(_) => "invalid",
        LoyaltyError::OrderOwnedByOther(_) => "conflict",
        _ => "error",
    }
}
