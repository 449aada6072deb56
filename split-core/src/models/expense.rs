use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identity of an expense row within one form.
///
/// Allocated from a per-form counter, so an id is never handed out twice even
/// after the row that held it has been deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowId(pub u64);

impl fmt::Display for RowId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One editable expense line as the user typed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseRow {
    pub id: RowId,
    /// Raw amount text, may contain thousands separators.
    pub amount: String,
    pub label: String,
}

impl ExpenseRow {
    pub fn blank(id: RowId) -> Self {
        Self {
            id,
            amount: String::new(),
            label: String::new(),
        }
    }
}

/// A label/amount pair whose amount is still raw text.
///
/// Implemented by the editable row and by the wire shape so payload builders
/// can accept either.
pub trait RawExpense {
    fn raw_amount(&self) -> &str;
    fn raw_label(&self) -> &str;
}

impl RawExpense for ExpenseRow {
    fn raw_amount(&self) -> &str {
        &self.amount
    }

    fn raw_label(&self) -> &str {
        &self.label
    }
}

/// A parsed expense ready for the split calculator or for storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseItem {
    pub label: String,
    pub amount: Decimal,
}

impl ExpenseItem {
    pub fn new(
        label: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            label: label.into(),
            amount,
        }
    }
}
