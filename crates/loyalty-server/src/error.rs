//! HTTP 接入层错误类型
//!
//! 将领域错误映射为 HTTP 状态码与 `{code, message}` 响应体

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use loyalty_core::LoyaltyError;
use serde_json::json;

/// 接入层错误
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("未授权: {0}")]
    Unauthorized(String),

    #[error("请求格式错误: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Loyalty(#[from] LoyaltyError),
}

impl ApiError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Loyalty(e) => match e {
                LoyaltyError::InvalidOrderNumber(_) | LoyaltyError::InvalidSum(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                // 本人重复上传是幂等成功
                LoyaltyError::OrderAlreadyExists(_) => StatusCode::OK,
                LoyaltyError::OrderOwnedByOther(_) | LoyaltyError::WithdrawalAlreadyExists(_) => {
                    StatusCode::CONFLICT
                }
                LoyaltyError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
                LoyaltyError::Accrual(_)
                | LoyaltyError::IllegalTransition { .. }
                | LoyaltyError::Database(_)
                | LoyaltyError::Persistence(_)
                | LoyaltyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// 返回错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Loyalty(e) => e.error_code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志
        let message = if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "请求处理失败");
            "服务内部错误，请稍后重试".to_string()
        } else {
            self.to_string()
        };

        let body = json!({
            "code": self.error_code(),
            "message": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// 接入层 Result 类型别名
pub type Result<T> = std::result::Result<T, ApiError>;
