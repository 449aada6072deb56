use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{FormSnapshot, RawExpense};

/// Most expense rows accepted from any persisted or shared source.
pub const MAX_RESTORED_EXPENSES: usize = 50;

/// One expense as it travels over the wire: both fields are raw text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedExpense {
    pub amount: String,
    pub label: String,
}

impl SharedExpense {
    pub fn new(
        amount: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            amount: amount.into(),
            label: label.into(),
        }
    }
}

impl RawExpense for SharedExpense {
    fn raw_amount(&self) -> &str {
        &self.amount
    }

    fn raw_label(&self) -> &str {
        &self.label
    }
}

/// Portable snapshot of the form.
///
/// The same shape is posted to the share service, written to local storage
/// under `fairshare_form`, and spread across query parameters for legacy
/// links. `currency` is omitted from the JSON when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharePayload {
    pub name1: String,
    pub name2: String,
    pub salary1: String,
    pub salary2: String,
    pub expenses: Vec<SharedExpense>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl SharePayload {
    /// Copies every row of the form, blanks included.
    pub fn from_form(
        form: &FormSnapshot,
        currency: Option<&str>,
    ) -> Self {
        Self {
            name1: form.person1_name.clone(),
            name2: form.person2_name.clone(),
            salary1: form.person1_salary.clone(),
            salary2: form.person2_salary.clone(),
            expenses: form
                .expenses
                .iter()
                .map(|row| SharedExpense::new(row.amount.clone(), row.label.clone()))
                .collect(),
            currency: currency.map(str::to_string),
        }
    }

    /// The shape kept in local storage: rows without an amount are dropped
    /// and blank labels become `"Expense"`.
    pub fn local_snapshot(
        form: &FormSnapshot,
        currency: Option<&str>,
    ) -> Self {
        let mut payload = Self::from_form(form, currency);
        payload.expenses = payload
            .expenses
            .into_iter()
            .filter(|e| !e.amount.replace(',', "").trim().is_empty())
            .map(|e| {
                let label = if e.label.is_empty() {
                    crate::calculations::DEFAULT_EXPENSE_LABEL.to_string()
                } else {
                    e.label
                };
                SharedExpense::new(e.amount, label)
            })
            .collect();
        payload
    }

    /// Coerces arbitrary JSON into a payload.
    ///
    /// Returns `None` only when `value` is not an object. Fields of the wrong
    /// type become empty strings, non-object expense entries are dropped and
    /// at most [`MAX_RESTORED_EXPENSES`] entries are kept.
    pub fn from_untrusted(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;

        let expenses = obj
            .get("expenses")
            .and_then(Value::as_array)
            .map(|items| coerce_expenses(items))
            .unwrap_or_default();

        Some(Self {
            name1: string_field(obj.get("name1")),
            name2: string_field(obj.get("name2")),
            salary1: string_field(obj.get("salary1")),
            salary2: string_field(obj.get("salary2")),
            expenses,
            currency: obj
                .get("currency")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        })
    }

    pub fn has_names(&self) -> bool {
        !self.name1.trim().is_empty() || !self.name2.trim().is_empty()
    }

    pub fn has_salaries(&self) -> bool {
        !self.salary1.replace(',', "").trim().is_empty()
            || !self.salary2.replace(',', "").trim().is_empty()
    }

    /// Rows whose amount is not blank.
    pub fn filled_expense_count(&self) -> usize {
        self.expenses
            .iter()
            .filter(|e| !e.amount.replace(',', "").trim().is_empty())
            .count()
    }
}

/// Coerces a JSON array of expense-like values, dropping non-objects and
/// capping the length.
pub fn coerce_expenses(items: &[Value]) -> Vec<SharedExpense> {
    items
        .iter()
        .filter_map(Value::as_object)
        .take(MAX_RESTORED_EXPENSES)
        .map(|e| SharedExpense {
            amount: string_field(e.get("amount")),
            label: string_field(e.get("label")),
        })
        .collect()
}

fn string_field(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}
