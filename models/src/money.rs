// models/src/money.rs

use rust_decimal::{Decimal, RoundingStrategy};

use crate::errors::{ValidationError, ValidationResult};

/// Rounds an amount to cents, half away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Formats an amount with exactly two decimals, e.g. `120.00`.
pub fn format_money(amount: Decimal) -> String {
    format!("{:.2}", round_money(amount))
}

pub fn ensure_non_negative(field: &str, amount: Decimal) -> ValidationResult<Decimal> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(ValidationError::NegativeAmount(field.to_string()));
    }
    Ok(round_money(amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn should_format_with_two_decimals() {
        assert_eq!(format_money(dec!(120)), "120.00");
        assert_eq!(format_money(dec!(0.005)), "0.01");
        assert_eq!(format_money(dec!(-3.5)), "-3.50");
    }

    #[test]
    fn should_reject_negative_amounts() {
        assert!(ensure_non_negative("amountPaid", dec!(-0.01)).is_err());
        assert_eq!(ensure_non_negative("amountPaid", dec!(0)).unwrap(), dec!(0));
    }
}
