//! 订单号校验
//!
//! 订单号必须是纯数字串，长度不超过 [`MAX_ORDER_NUMBER_LEN`]，并通过 Luhn 校验。

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{LoyaltyError, Result};

/// 订单号最大长度，与订单表、入账表、提现表的订单号列宽一致
pub const MAX_ORDER_NUMBER_LEN: usize = 64;

static ORDER_NUMBER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+$").expect("order number pattern is valid"));

/// Luhn 校验
///
/// 从右往左，每隔一位乘 2，结果大于 9 时减 9，所有位求和后能被 10 整除即通过。
/// 含非数字字符或为空时返回 false。
pub fn is_valid_luhn(number: &str) -> bool {
    if number.is_empty() {
        return false;
    }

    let mut sum = 0u32;
    for (i, c) in number.chars().rev().enumerate() {
        let Some(mut digit) = c.to_digit(10) else {
            return false;
        };
        if i % 2 == 1 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
    }

    sum % 10 == 0
}

/// 校验并规整订单号（去除首尾空白）
pub fn validate_order_number(raw: &str) -> Result<String> {
    let number = raw.trim();
    if number.len() > MAX_ORDER_NUMBER_LEN
        || !ORDER_NUMBER_PATTERN.is_match(number)
        || !is_valid_luhn(number)
    {
        return Err(LoyaltyError::InvalidOrderNumber(number.to_string()));
    }
    Ok(number.to_string())
}
