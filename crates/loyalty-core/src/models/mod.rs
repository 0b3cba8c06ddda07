//! 领域模型定义

mod balance;
mod enums;
mod order;
mod withdrawal;

pub use balance::*;
pub use enums::*;
pub use order::*;
pub use withdrawal::*;

use rust_decimal::{Decimal, RoundingStrategy};

/// 金额精度（小数位）
pub const AMOUNT_SCALE: u32 = 2;

/// 将金额四舍五入到两位小数
pub fn round_amount(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_amount() {
        assert_eq!(round_amount(Decimal::new(12345, 3)), Decimal::new(1235, 2));
        assert_eq!(round_amount(Decimal::new(-12345, 3)), Decimal::new(-1235, 2));
        assert_eq!(round_amount(Decimal::new(500, 0)), Decimal::new(500, 0));
    }
}
