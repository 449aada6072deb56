//! CSV loader for expense lists.
//!
//! ## CSV Format
//!
//! Headers are matched by name, so column order does **not** matter. Header
//! names are case-sensitive.
//!
//! | Column   | Required | Type    | Notes                                        |
//! |----------|----------|---------|----------------------------------------------|
//! | `amount` | yes      | decimal | Thousands separators allowed, e.g. `"1,200"` |
//! | `label`  | no       | string  | Empty or missing becomes `Expense`           |
//!
//! Rows whose amount is empty are skipped, the same way blank rows are
//! skipped in the form.
//!
//! ### Example
//!
//! ```csv
//! label,amount
//! Rent,"1,200.00"
//! Groceries,450
//! ```
use rust_decimal::Decimal;
use serde::Deserialize;
use split_core::ExpenseItem;
use split_core::calculations::format::{is_blank_amount, parse_amount};

// ---------------------------------------------------------------------------
// Serde-compatible row that mirrors the CSV layout
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default)]
    label: Option<String>,
    amount: String,
}

// ---------------------------------------------------------------------------
// Public error type
// ---------------------------------------------------------------------------

/// Errors that can occur while loading expense CSV data.
#[derive(Debug, thiserror::Error)]
pub enum CsvLoadError {
    /// The file could not be read.
    #[error("cannot read CSV file: {0}")]
    Io(#[from] std::io::Error),

    /// The underlying CSV deserialisation failed (bad structure, missing
    /// `amount` column, etc.).
    #[error("CSV parse error: {0}")]
    Parse(#[from] csv::Error),

    /// An `amount` cell is not a number. `row` is 1-based (header = row 0).
    #[error("invalid amount '{value}' on row {row}")]
    InvalidAmount { value: String, row: usize },

    /// An `amount` cell is zero or negative.
    #[error("amount on row {row} must be greater than zero")]
    NonPositiveAmount { row: usize },
}

// ---------------------------------------------------------------------------
// Core loader
// ---------------------------------------------------------------------------

fn convert_row(
    row: CsvRow,
    row_number: usize,
) -> Result<Option<ExpenseItem>, CsvLoadError> {
    if is_blank_amount(&row.amount) {
        return Ok(None);
    }
    let amount = parse_amount(&row.amount).ok_or_else(|| CsvLoadError::InvalidAmount {
        value: row.amount.clone(),
        row: row_number,
    })?;
    if amount <= Decimal::ZERO {
        return Err(CsvLoadError::NonPositiveAmount { row: row_number });
    }
    Ok(Some(ExpenseItem::new(row.label.unwrap_or_default(), amount)))
}

/// Parse CSV text and return the expenses in file order.
///
/// # Errors
///
/// * [CsvLoadError::Parse] – if the CSV is structurally invalid or has no
///   `amount` column.
/// * [CsvLoadError::InvalidAmount] / [CsvLoadError::NonPositiveAmount] – for
///   the first bad amount.
pub fn load_from_str(input: &str) -> Result<Vec<ExpenseItem>, CsvLoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(false)
        .from_reader(input.as_bytes());

    let mut expenses = Vec::new();
    for (idx, result) in reader.deserialize::<CsvRow>().enumerate() {
        if let Some(expense) = convert_row(result?, idx + 1)? {
            expenses.push(expense);
        }
    }
    Ok(expenses)
}

/// Read a file from disk and delegate to [load_from_str].
pub fn load_from_file(path: &std::path::Path) -> Result<Vec<ExpenseItem>, CsvLoadError> {
    let contents = std::fs::read_to_string(path)?;
    load_from_str(&contents)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
