//! 积分计算系统响应体

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{AccrualError, AccrualResult};
use crate::models::{AccrualStatus, round_amount};

/// `GET /api/orders/{number}` 的 200 响应
///
/// `status` 先按字符串接收，未知取值在 [`AccrualResponse::into_result`] 中拒绝，
/// 不会直接反序列化失败成笼统的解析错误。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccrualResponse {
    pub order: String,
    pub status: String,
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub accrual: Option<Decimal>,
}

impl AccrualResponse {
    /// 校验并转换为领域结果
    ///
    /// - 未知状态 -> `UnknownStatus`
    /// - PROCESSED 缺少积分或积分为负 -> `InvalidAccrual`
    /// - 其余状态携带的积分被忽略
    pub fn into_result(self) -> Result<AccrualResult, AccrualError> {
        let status: AccrualStatus = self.status.parse().map_err(AccrualError::UnknownStatus)?;

        let accrual = match (status, self.accrual) {
            (AccrualStatus::Processed, None) => {
                return Err(AccrualError::InvalidAccrual {
                    order: self.order,
                    reason: "PROCESSED 缺少 accrual".to_string(),
                });
            }
            (AccrualStatus::Processed, Some(v)) if v < Decimal::ZERO => {
                return Err(AccrualError::InvalidAccrual {
                    order: self.order,
                    reason: format!("accrual 为负数: {v}"),
                });
            }
            (AccrualStatus::Processed, Some(v)) => Some(round_amount(v)),
            _ => None,
        };

        Ok(AccrualResult {
            order: self.order,
            status,
            accrual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<AccrualResult, AccrualError> {
        serde_json::from_str::<AccrualResponse>(json)
            .unwrap()
            .into_result()
    }

    #[test]
    fn test_processed_with_accrual() {
        let result = parse(r#"{"order":"79927398713","status":"PROCESSED","accrual":729.98}"#)
            .unwrap();
        assert_eq!(result.status, AccrualStatus::Processed);
        assert_eq!(result.accrual, Some(Decimal::new(72998, 2)));
    }

    #[test]
    fn test_registered_without_accrual() {
        let result = parse(r#"{"order":"79927398713","status":"REGISTERED"}"#).unwrap();
        assert_eq!(result.status, AccrualStatus::Registered);
        assert!(result.accrual.is_none());
    }

    #[test]
    fn test_accrual_ignored_for_non_processed() {
        let result =
            parse(r#"{"order":"79927398713","status":"INVALID","accrual":10}"#).unwrap();
        assert!(result.accrual.is_none());
    }

    #[test]
    fn test_unknown_status_rejected() {
        let err = parse(r#"{"order":"79927398713","status":"CANCELLED"}"#).unwrap_err();
        assert!(matches!(err, AccrualError::UnknownStatus(s) if s == "CANCELLED"));
    }

    #[test]
    fn test_processed_requires_valid_accrual() {
        let err = parse(r#"{"order":"79927398713","status":"PROCESSED"}"#).unwrap_err();
        assert!(matches!(err, AccrualError::InvalidAccrual { .. }));

        let err =
            parse(r#"{"order":"79927398713","status":"PROCESSED","accrual":-1.5}"#).unwrap_err();
        assert!(matches!(err, AccrualError::InvalidAccrual { .. }));
    }

    #[test]
    fn test_accrual_rounded() {
        let result =
            parse(r#"{"order":"79927398713","status":"PROCESSED","accrual":10.123}"#).unwrap();
        assert_eq!(result.accrual, Some(Decimal::new(1012, 2)));
    }
}
