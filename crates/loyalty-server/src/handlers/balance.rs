//! 余额与提现 API 处理器

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use loyalty_core::LoyaltyError;
use loyalty_shared::observability::metrics;

use crate::{
    dto::{BalanceDto, WithdrawRequest, WithdrawalDto},
    error::{ApiError, Result},
    middleware::AuthUser,
    state::AppState,
};

/// 查询余额
///
/// GET /api/user/balance
pub async fn get_balance(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<BalanceDto>> {
    let balance = state.withdrawal_service.get_balance(user_id).await?;
    Ok(Json(balance.into()))
}

/// 积分抵扣
///
/// POST /api/user/balance/withdraw
///
/// - 200 扣减成功
/// - 402 余额不足
/// - 409 引用号已使用
/// - 422 引用号无效或金额不为正
pub async fn withdraw(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    payload: std::result::Result<Json<WithdrawRequest>, JsonRejection>,
) -> Result<StatusCode> {
    let Json(req) = payload.map_err(|e| {
        metrics::record_withdrawal("invalid");
        ApiError::BadRequest(e.body_text())
    })?;

    match state
        .withdrawal_service
        .withdraw(user_id, &req.order, req.sum)
        .await
    {
        Ok(_) => {
            metrics::record_withdrawal("success");
            Ok(StatusCode::OK)
        }
        Err(e) => {
            metrics::record_withdrawal(withdrawal_outcome(&e));
            Err(e.into())
        }
    }
}

/// 查询提现记录，按处理时间倒序
///
/// GET /api/user/withdrawals
///
/// 没有记录时返回 204
pub async fn list_withdrawals(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Response> {
    let withdrawals = state.withdrawal_service.list_withdrawals(user_id).await?;
    if withdrawals.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let items: Vec<WithdrawalDto> = withdrawals.into_iter().map(WithdrawalDto::from).collect();
    Ok(Json(items).into_response())
}

fn withdrawal_outcome(error: &LoyaltyError) -> &'static str {
    match error {
        LoyaltyError::InsufficientFunds { .. } => "insufficient_funds",
        LoyaltyError::InvalidOrderNumber(_) | LoyaltyError::InvalidSum(_) => "invalid",
        LoyaltyError::WithdrawalAlreadyExists(_) => "duplicate",
        _ => "error",
    }
}
