use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One expense and what each person pays toward it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseShare {
    pub label: String,
    pub amount: Decimal,
    pub person1_share: Decimal,
    pub person2_share: Decimal,
}

/// Output of a split calculation.
///
/// Built once by the calculator and replaced wholesale by the next
/// calculation; nothing edits it in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationResult {
    pub person1_name: String,
    pub person2_name: String,

    pub person1_total: Decimal,
    pub person2_total: Decimal,

    /// Whole percent, rounded independently of the other person's.
    pub person1_percentage: u32,
    pub person2_percentage: u32,

    pub total_expenses: Decimal,
    pub expense_breakdown: Vec<ExpenseShare>,

    // Kept for the "how we worked this out" explanation.
    pub person1_income: Decimal,
    pub person2_income: Decimal,
    pub combined_income: Decimal,
}

impl CalculationResult {
    pub fn has_custom_names(&self) -> bool {
        self.person1_name != crate::calculations::DEFAULT_PERSON1_NAME
            || self.person2_name != crate::calculations::DEFAULT_PERSON2_NAME
    }

    pub fn has_custom_labels(&self) -> bool {
        self.expense_breakdown
            .iter()
            .any(|e| e.label != crate::calculations::DEFAULT_EXPENSE_LABEL)
    }
}
