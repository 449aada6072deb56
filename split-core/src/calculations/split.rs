//! Income-proportional expense splitting.
//!
//! Each expense is divided between two people in the ratio of their
//! incomes:
//!
//! | Value      | Formula |
//! |------------|---------|
//! | combined   | income 1 + income 2 |
//! | share 1    | amount × income 1 ÷ combined |
//! | share 2    | amount × income 2 ÷ combined |
//! | total i    | Σ share i over all expenses |
//! | percentage | round half-up (total i ÷ (total 1 + total 2) × 100) |
//!
//! The two percentages are rounded independently, so they can add up to
//! 99 or 101.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use split_core::ExpenseItem;
//! use split_core::calculations::{SplitCalculator, SplitInput};
//!
//! let input = SplitInput {
//!     person1_income: dec!(3500),
//!     person2_income: dec!(2500),
//!     expenses: vec![ExpenseItem::new("Rent", dec!(1200))],
//!     person1_name: "Alex".to_string(),
//!     person2_name: String::new(),
//! };
//!
//! let result = SplitCalculator::new().calculate(&input).unwrap();
//!
//! assert_eq!(result.person1_total, dec!(700));
//! assert_eq!(result.person2_total, dec!(500));
//! assert_eq!(result.person1_percentage, 58);
//! assert_eq!(result.person2_name, "Person 2");
//! ```

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::common::round_whole;
use crate::models::{CalculationResult, ExpenseItem, ExpenseShare};

pub const DEFAULT_PERSON1_NAME: &str = "Person 1";
pub const DEFAULT_PERSON2_NAME: &str = "Person 2";
pub const DEFAULT_EXPENSE_LABEL: &str = "Expense";

/// Errors that can occur while splitting expenses.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SplitError {
    /// An income was negative.
    #[error("income cannot be negative: {0}")]
    NegativeIncome(Decimal),

    /// Both incomes were zero, so there is no ratio to split by.
    #[error("combined income must be greater than zero")]
    ZeroCombinedIncome,

    /// An expense amount was zero or negative.
    #[error("expense amount must be greater than zero: {0}")]
    NonPositiveExpense(Decimal),

    /// There was nothing to split.
    #[error("no expenses to split")]
    NoExpenses,

    /// An intermediate value did not fit in a decimal.
    #[error("amount too large to split")]
    Overflow,
}

/// Input values for a split.
///
/// Names are taken as given; blank names fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitInput {
    pub person1_income: Decimal,
    pub person2_income: Decimal,
    pub expenses: Vec<ExpenseItem>,
    pub person1_name: String,
    pub person2_name: String,
}

/// Stateless calculator for proportional splits.
#[derive(Debug, Clone, Copy, Default)]
pub struct SplitCalculator;

impl SplitCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Splits every expense and totals the shares.
    ///
    /// # Errors
    ///
    /// Fails on negative incomes, a zero combined income, non-positive
    /// expense amounts, an empty expense list, or arithmetic overflow.
    pub fn calculate(
        &self,
        input: &SplitInput,
    ) -> Result<CalculationResult, SplitError> {
        for income in [input.person1_income, input.person2_income] {
            if income.is_sign_negative() && !income.is_zero() {
                return Err(SplitError::NegativeIncome(income));
            }
        }
        let combined_income = input
            .person1_income
            .checked_add(input.person2_income)
            .ok_or(SplitError::Overflow)?;
        if combined_income.is_zero() {
            return Err(SplitError::ZeroCombinedIncome);
        }
        if input.expenses.is_empty() {
            return Err(SplitError::NoExpenses);
        }

        let mut breakdown = Vec::with_capacity(input.expenses.len());
        let mut person1_total = Decimal::ZERO;
        let mut person2_total = Decimal::ZERO;

        for expense in &input.expenses {
            if expense.amount <= Decimal::ZERO {
                return Err(SplitError::NonPositiveExpense(expense.amount));
            }
            let person1_share = share_of(expense.amount, input.person1_income, combined_income)?;
            let person2_share = share_of(expense.amount, input.person2_income, combined_income)?;

            person1_total = person1_total
                .checked_add(person1_share)
                .ok_or(SplitError::Overflow)?;
            person2_total = person2_total
                .checked_add(person2_share)
                .ok_or(SplitError::Overflow)?;

            breakdown.push(ExpenseShare {
                label: label_or_default(&expense.label),
                amount: expense.amount,
                person1_share,
                person2_share,
            });
        }

        let total_expenses = person1_total
            .checked_add(person2_total)
            .ok_or(SplitError::Overflow)?;

        let result = CalculationResult {
            person1_name: name_or_default(&input.person1_name, DEFAULT_PERSON1_NAME),
            person2_name: name_or_default(&input.person2_name, DEFAULT_PERSON2_NAME),
            person1_total,
            person2_total,
            person1_percentage: percentage_of(person1_total, total_expenses)?,
            person2_percentage: percentage_of(person2_total, total_expenses)?,
            total_expenses,
            expense_breakdown: breakdown,
            person1_income: input.person1_income,
            person2_income: input.person2_income,
            combined_income,
        };

        debug!(
            expenses = result.expense_breakdown.len(),
            person1_percentage = result.person1_percentage,
            person2_percentage = result.person2_percentage,
            "split calculated"
        );

        Ok(result)
    }
}

/// Convenience wrapper around [`SplitCalculator::calculate`].
pub fn calculate_shares(input: &SplitInput) -> Result<CalculationResult, SplitError> {
    SplitCalculator::new().calculate(input)
}

// Multiplying before dividing keeps exact results exact (3500/6000 of 1200
// is 700, not 699.999...).
fn share_of(
    amount: Decimal,
    income: Decimal,
    combined: Decimal,
) -> Result<Decimal, SplitError> {
    amount
        .checked_mul(income)
        .and_then(|v| v.checked_div(combined))
        .ok_or(SplitError::Overflow)
}

fn percentage_of(
    part: Decimal,
    total: Decimal,
) -> Result<u32, SplitError> {
    let ratio = part.checked_div(total).ok_or(SplitError::Overflow)?;
    let percent = ratio
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or(SplitError::Overflow)?;
    round_whole(percent).to_u32().ok_or(SplitError::Overflow)
}

fn name_or_default(
    name: &str,
    default: &str,
) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed.to_string()
    }
}

fn label_or_default(label: &str) -> String {
    name_or_default(label, DEFAULT_EXPENSE_LABEL)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::calculations::common::round_half_up;

    fn input(
        income1: Decimal,
        income2: Decimal,
        amounts: &[Decimal],
    ) -> SplitInput {
        SplitInput {
            person1_income: income1,
            person2_income: income2,
            expenses: amounts
                .iter()
                .map(|a| ExpenseItem::new("", *a))
                .collect(),
            person1_name: String::new(),
            person2_name: String::new(),
        }
    }

    // =========================================================================
    // Worked examples
    // =========================================================================

    #[test]
    fn splits_rent_by_income_ratio() {
        let mut split = input(dec!(3500), dec!(2500), &[dec!(1200)]);
        split.expenses[0].label = "Rent".to_string();

        let result = calculate_shares(&split).unwrap();

        assert_eq!(round_half_up(result.person1_total), dec!(700.00));
        assert_eq!(round_half_up(result.person2_total), dec!(500.00));
        assert_eq!(result.person1_percentage, 58);
        assert_eq!(result.person2_percentage, 42);
        assert_eq!(result.expense_breakdown[0].label, "Rent");
    }

    #[test]
    fn percentages_round_half_up_independently() {
        let result = calculate_shares(&input(dec!(5000), dec!(3000), &[dec!(2200)])).unwrap();

        assert_eq!(result.person1_total, dec!(1375));
        assert_eq!(result.person2_total, dec!(825));
        assert_eq!(result.person1_percentage, 63);
        assert_eq!(result.person2_percentage, 38);
    }

    #[test]
    fn keeps_incomes_for_explanation() {
        let result = calculate_shares(&input(dec!(4000), dec!(1000), &[dec!(50)])).unwrap();

        assert_eq!(result.person1_income, dec!(4000));
        assert_eq!(result.person2_income, dec!(1000));
        assert_eq!(result.combined_income, dec!(5000));
    }

    // =========================================================================
    // Invariants
    // =========================================================================

    #[test]
    fn shares_add_up_to_each_expense() {
        let amounts = [dec!(100), dec!(33.33), dec!(1234.56), dec!(0.01)];
        let result = calculate_shares(&input(dec!(1), dec!(2), &amounts)).unwrap();

        for share in &result.expense_breakdown {
            let diff = (share.person1_share + share.person2_share - share.amount).abs();
            assert!(diff < dec!(0.000001), "{share:?}");
        }
        let total: Decimal = amounts.iter().sum();
        assert!((result.total_expenses - total).abs() < dec!(0.000001));
    }

    #[test]
    fn percentages_stay_within_one_of_hundred() {
        for (a, b) in [(dec!(1), dec!(2)), (dec!(5000), dec!(3000)), (dec!(7), dec!(13))] {
            let result = calculate_shares(&input(a, b, &[dec!(99.99)])).unwrap();
            let sum = result.person1_percentage + result.person2_percentage;

            assert!((99..=101).contains(&sum), "{a}/{b} gave {sum}");
        }
    }

    #[test]
    fn one_zero_income_puts_everything_on_the_other_person() {
        let result = calculate_shares(&input(dec!(0), dec!(2000), &[dec!(300)])).unwrap();

        assert_eq!(result.person1_total, dec!(0));
        assert_eq!(result.person2_total, dec!(300));
        assert_eq!(result.person2_percentage, 100);
    }

    // =========================================================================
    // Defaults
    // =========================================================================

    #[test]
    fn blank_names_and_labels_get_defaults() {
        let mut split = input(dec!(1), dec!(1), &[dec!(10)]);
        split.person1_name = "  ".to_string();
        split.person2_name = " Sam ".to_string();

        let result = calculate_shares(&split).unwrap();

        assert_eq!(result.person1_name, DEFAULT_PERSON1_NAME);
        assert_eq!(result.person2_name, "Sam");
        assert_eq!(result.expense_breakdown[0].label, DEFAULT_EXPENSE_LABEL);
        assert!(result.has_custom_names());
        assert!(!result.has_custom_labels());
    }

    // =========================================================================
    // Guards
    // =========================================================================

    #[test]
    fn zero_combined_income_is_an_error() {
        let result = calculate_shares(&input(dec!(0), dec!(0), &[dec!(10)]));

        assert_eq!(result, Err(SplitError::ZeroCombinedIncome));
    }

    #[test]
    fn negative_income_is_an_error() {
        let result = calculate_shares(&input(dec!(-5), dec!(10), &[dec!(10)]));

        assert_eq!(result, Err(SplitError::NegativeIncome(dec!(-5))));
    }

    #[test]
    fn empty_expense_list_is_an_error() {
        let result = calculate_shares(&input(dec!(1), dec!(1), &[]));

        assert_eq!(result, Err(SplitError::NoExpenses));
    }

    #[test]
    fn zero_expense_is_an_error() {
        let result = calculate_shares(&input(dec!(1), dec!(1), &[dec!(0)]));

        assert_eq!(result, Err(SplitError::NonPositiveExpense(dec!(0))));
    }

    #[test]
    fn overflow_is_reported_not_panicked() {
        let result = calculate_shares(&input(Decimal::MAX, dec!(1), &[dec!(10)]));

        assert_eq!(result, Err(SplitError::Overflow));
    }
}
