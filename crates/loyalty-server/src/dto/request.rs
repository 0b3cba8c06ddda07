//! 请求 DTO

use rust_decimal::Decimal;
use serde::Deserialize;

/// 积分抵扣请求
#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawRequest {
    /// 支付引用号（Luhn 校验）
    pub order: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub sum: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_withdraw_request() {
        let req: WithdrawRequest =
            serde_json::from_str(r#"{"order":"2377225624","sum":751}"#).unwrap();
        assert_eq!(req.order, "2377225624");
        assert_eq!(req.sum, Decimal::new(751, 0));

        let req: WithdrawRequest =
            serde_json::from_str(r#"{"order":"2377225624","sum":12.5}"#).unwrap();
        assert_eq!(req.sum, Decimal::new(125, 1));
    }

    #[test]
    fn test_missing_sum_rejected() {
        assert!(serde_json::from_str::<WithdrawRequest>(r#"{"order":"2377225624"}"#).is_err());
    }
}
