//! Common rounding helpers for split calculations.

use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds a decimal value to exactly two decimal places using half-up rounding.
///
/// Values at exactly 0.005 are rounded away from zero.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use split_core::calculations::common::round_half_up;
///
/// assert_eq!(round_half_up(dec!(123.454)), dec!(123.45));
/// assert_eq!(round_half_up(dec!(123.455)), dec!(123.46));
/// assert_eq!(round_half_up(dec!(-123.455)), dec!(-123.46)); // Away from zero
/// ```
pub fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Rounds to a whole number, halves away from zero.
///
/// ```
/// use rust_decimal_macros::dec;
/// use split_core::calculations::common::round_whole;
///
/// assert_eq!(round_whole(dec!(62.5)), dec!(63));
/// assert_eq!(round_whole(dec!(37.49)), dec!(37));
/// ```
pub fn round_whole(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    // =========================================================================
    // round_half_up tests
    // =========================================================================

    #[test]
    fn round_half_up_rounds_down_below_midpoint() {
        let result = round_half_up(dec!(123.454));

        assert_eq!(result, dec!(123.45));
    }

    #[test]
    fn round_half_up_rounds_up_at_midpoint() {
        let result = round_half_up(dec!(123.455));

        assert_eq!(result, dec!(123.46));
    }

    #[test]
    fn round_half_up_handles_negative_values() {
        let result = round_half_up(dec!(-123.455));

        assert_eq!(result, dec!(-123.46));
    }

    #[test]
    fn round_half_up_handles_long_fractions() {
        let result = round_half_up(dec!(699.99999999999999999999999996));

        assert_eq!(result, dec!(700.00));
    }

    // =========================================================================
    // round_whole tests
    // =========================================================================

    #[test]
    fn round_whole_rounds_half_up() {
        assert_eq!(round_whole(dec!(62.5)), dec!(63));
        assert_eq!(round_whole(dec!(37.5)), dec!(38));
    }

    #[test]
    fn round_whole_rounds_down_below_half() {
        let result = round_whole(dec!(41.6666));

        assert_eq!(result, dec!(42));
    }

    #[test]
    fn round_whole_keeps_integers() {
        let result = round_whole(dec!(100));

        assert_eq!(result, dec!(100));
    }
}
