use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ExpenseItem;

/// Authenticated user, as handed over by whatever performs sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for UserId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HouseholdId(pub i64);

impl fmt::Display for HouseholdId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigurationId(pub i64);

impl fmt::Display for ConfigurationId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConfigurationId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// For saving a new configuration (no id or timestamps)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewConfiguration {
    /// Blank means "use today's date".
    pub name: Option<String>,
    pub person1_name: String,
    pub person2_name: String,
    pub person1_salary: Decimal,
    pub person2_salary: Decimal,
    pub expenses: Vec<ExpenseItem>,
    pub currency: String,
}

/// A list entry on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationSummary {
    pub id: ConfigurationId,
    pub name: String,
    pub person1_name: String,
    pub person2_name: String,
    pub total_expenses: Decimal,
    pub expense_count: usize,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedExpense {
    pub id: i64,
    pub label: String,
    pub amount: Decimal,
    pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationDetail {
    pub id: ConfigurationId,
    pub name: String,
    pub person1_name: String,
    pub person2_name: String,
    pub person1_salary: Decimal,
    pub person2_salary: Decimal,
    pub currency: String,
    /// Ordered by `sort_order`.
    pub expenses: Vec<SavedExpense>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConfigurationDetail {
    pub fn total_expenses(&self) -> Decimal {
        self.expenses.iter().map(|e| e.amount).sum()
    }

    pub fn expense_count(&self) -> usize {
        self.expenses.len()
    }
}
