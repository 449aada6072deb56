use std::fmt;

use serde::{Serialize, Serializer};

use super::RowId;

/// Which form field a validation error belongs to.
///
/// Renders to the keys the front end binds against: `person1Salary`,
/// `expense-<rowId>`, `expenses-global` and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldId {
    Person1Name,
    Person2Name,
    Person1Salary,
    Person2Salary,
    Expense(RowId),
    ExpensesGlobal,
}

impl FieldId {
    /// Coarse error family reported to analytics.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Person1Name | Self::Person2Name => "name_too_long",
            Self::Person1Salary | Self::Person2Salary => "missing",
            Self::Expense(_) => "invalid_format",
            Self::ExpensesGlobal => "missing_expense",
        }
    }

    pub fn is_salary(&self) -> bool {
        matches!(self, Self::Person1Salary | Self::Person2Salary)
    }

    pub fn is_expense(&self) -> bool {
        matches!(self, Self::Expense(_) | Self::ExpensesGlobal)
    }
}

impl fmt::Display for FieldId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::Person1Name => f.write_str("person1Name"),
            Self::Person2Name => f.write_str("person2Name"),
            Self::Person1Salary => f.write_str("person1Salary"),
            Self::Person2Salary => f.write_str("person2Salary"),
            Self::Expense(id) => write!(f, "expense-{id}"),
            Self::ExpensesGlobal => f.write_str("expenses-global"),
        }
    }
}

impl Serialize for FieldId {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: FieldId,
    pub message: String,
}

impl FieldError {
    pub fn new(
        field: FieldId,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn field_ids_render_as_form_keys() {
        assert_eq!(FieldId::Person1Salary.to_string(), "person1Salary");
        assert_eq!(FieldId::Person2Name.to_string(), "person2Name");
        assert_eq!(FieldId::Expense(RowId(7)).to_string(), "expense-7");
        assert_eq!(FieldId::ExpensesGlobal.to_string(), "expenses-global");
    }

    #[test]
    fn field_error_serializes_field_as_key() {
        let error = FieldError::new(FieldId::Expense(RowId(3)), "Enter an expense amount");

        let json = serde_json::to_string(&error).unwrap();

        assert_eq!(
            json,
            r#"{"field":"expense-3","message":"Enter an expense amount"}"#
        );
    }
}
