//! Turning raw rows into the parsed shapes used for splitting and saving.

use rust_decimal::Decimal;

use super::format::parse_amount;
use super::split::{DEFAULT_EXPENSE_LABEL, DEFAULT_PERSON1_NAME, DEFAULT_PERSON2_NAME};
use crate::models::{ExpenseItem, NewConfiguration, RawExpense, SharePayload, normalize_currency_code};

/// Keeps rows with a positive amount; blank labels become `"Expense"`.
///
/// This is the same filter the calculator applies, so a saved
/// configuration always holds exactly the expenses that were split.
pub fn build_expenses_payload<E: RawExpense>(rows: &[E]) -> Vec<ExpenseItem> {
    rows.iter()
        .filter_map(|row| {
            let amount = positive_amount(row.raw_amount())?;
            let label = row.raw_label().trim();
            let label = if label.is_empty() {
                DEFAULT_EXPENSE_LABEL
            } else {
                label
            };
            Some(ExpenseItem::new(label, amount))
        })
        .collect()
}

/// Converts a stored local snapshot into a save request.
///
/// Returns `None` when either salary is missing or not positive, or when no
/// expense has a positive amount. The configuration name is left unset so
/// the store picks its dated default.
pub fn build_pending_save(snapshot: &SharePayload) -> Option<NewConfiguration> {
    let person1_salary = positive_amount(&snapshot.salary1)?;
    let person2_salary = positive_amount(&snapshot.salary2)?;

    let expenses = build_expenses_payload(&snapshot.expenses);
    if expenses.is_empty() {
        return None;
    }

    Some(NewConfiguration {
        name: None,
        person1_name: or_default(&snapshot.name1, DEFAULT_PERSON1_NAME),
        person2_name: or_default(&snapshot.name2, DEFAULT_PERSON2_NAME),
        person1_salary,
        person2_salary,
        expenses,
        currency: normalize_currency_code(snapshot.currency.as_deref()),
    })
}

fn positive_amount(raw: &str) -> Option<Decimal> {
    parse_amount(raw).filter(|v| *v > Decimal::ZERO)
}

fn or_default(
    value: &str,
    default: &str,
) -> String {
    match value.trim() {
        "" => default.to_string(),
        trimmed => trimmed.to_string(),
    }
}
