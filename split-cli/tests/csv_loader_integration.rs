//! Integration tests that exercise the loader against an on-disk fixture file.
//!
//! These complement the unit tests inside csv_loader.rs (which all use
//! inline string literals) by covering the read-from-disk path.

use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;
use split_cli::csv_loader::{self, CsvLoadError};
use split_core::ExpenseItem;

fn fixture_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("expenses.csv")
}

#[test]
fn test_load_fixture_file_skips_blank_amounts() {
    let expenses =
        csv_loader::load_from_file(&fixture_path()).expect("fixture file should load without error");

    // Four data rows, one without an amount.
    assert_eq!(expenses.len(), 3);
}

#[test]
fn test_load_fixture_values() {
    let expenses = csv_loader::load_from_file(&fixture_path()).unwrap();

    assert_eq!(
        expenses,
        vec![
            ExpenseItem::new("Rent", dec!(1200.00)),
            ExpenseItem::new("Groceries", dec!(450.50)),
            ExpenseItem::new("", dec!(80)),
        ]
    );
}

#[test]
fn test_load_nonexistent_file_returns_io_error() {
    let bad_path = Path::new("/this/path/does/not/exist.csv");
    let result = csv_loader::load_from_file(bad_path);

    assert!(matches!(result, Err(CsvLoadError::Io(_))));
}
