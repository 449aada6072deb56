use std::sync::LazyLock;

use regex::Regex;
use split_core::SharedExpense;
use thiserror::Error;

static EXPENSE_ARG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:(?P<label>[^=]*?)\s*=\s*)?(?P<amount>[^=]*?)\s*$").expect("static pattern")
});

/// Error returned when an `--expense` argument cannot be understood.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid expense '{input}': expected LABEL=AMOUNT or AMOUNT")]
pub struct ParseExpenseError {
    input: String,
}

/// Parses an expense given on the command line.
///
/// Accepts `Rent=1,200`, `Rent = 1200.50` or a bare `1200`. The amount is
/// kept as typed; it goes through the form like any other input.
pub fn parse_expense_arg(s: &str) -> Result<SharedExpense, ParseExpenseError> {
    let error = || ParseExpenseError {
        input: s.to_string(),
    };
    let caps = EXPENSE_ARG.captures(s).ok_or_else(error)?;
    let amount = caps.name("amount").map_or("", |m| m.as_str());
    if amount.is_empty() {
        return Err(error());
    }
    let label = caps.name("label").map_or("", |m| m.as_str());
    Ok(SharedExpense::new(amount, label))
}
