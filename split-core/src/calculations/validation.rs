//! Field-level validation of the calculator form.
//!
//! Every rule runs; errors come back in form order (names, salaries, expense
//! rows, then the global expense error) so the first one can be focused.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use super::format::{is_blank_amount, parse_amount};
use crate::models::{FieldError, FieldId, FormSnapshot};

pub const MAX_SALARY: Decimal = dec!(999999999);
pub const MAX_EXPENSE: Decimal = dec!(999999999);
pub const MAX_NAME_LENGTH: usize = 50;

pub const NAME_TOO_LONG: &str = "Keep names to 50 characters or fewer";
pub const SALARY_REQUIRED: &str = "Enter a take-home salary to get started";
pub const EXPENSE_INVALID: &str = "Enter an expense amount";
pub const EXPENSES_REQUIRED: &str = "Add at least one expense to see your split";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationOutcome {
    pub errors: Vec<FieldError>,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error_for(
        &self,
        field: FieldId,
    ) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    pub fn has_error(
        &self,
        field: FieldId,
    ) -> bool {
        self.error_for(field).is_some()
    }
}

/// Checks a form snapshot.
///
/// Expense rows with a blank amount are skipped whatever their label says.
/// If no row carries a valid amount a single `expenses-global` error is
/// added, even when individual rows already failed.
pub fn validate_form(form: &FormSnapshot) -> ValidationOutcome {
    let mut errors = Vec::new();

    for (field, name) in [
        (FieldId::Person1Name, &form.person1_name),
        (FieldId::Person2Name, &form.person2_name),
    ] {
        if name.trim().chars().count() > MAX_NAME_LENGTH {
            errors.push(FieldError::new(field, NAME_TOO_LONG));
        }
    }

    for (field, salary) in [
        (FieldId::Person1Salary, &form.person1_salary),
        (FieldId::Person2Salary, &form.person2_salary),
    ] {
        if !in_range(parse_amount(salary), MAX_SALARY) {
            errors.push(FieldError::new(field, SALARY_REQUIRED));
        }
    }

    let mut valid_expense_count = 0;
    for row in &form.expenses {
        if is_blank_amount(&row.amount) {
            continue;
        }
        if in_range(parse_amount(&row.amount), MAX_EXPENSE) {
            valid_expense_count += 1;
        } else {
            errors.push(FieldError::new(FieldId::Expense(row.id), EXPENSE_INVALID));
        }
    }

    if valid_expense_count == 0 {
        errors.push(FieldError::new(FieldId::ExpensesGlobal, EXPENSES_REQUIRED));
    }

    ValidationOutcome { errors }
}

fn in_range(
    value: Option<Decimal>,
    max: Decimal,
) -> bool {
    matches!(value, Some(v) if v > Decimal::ZERO && v <= max)
}
