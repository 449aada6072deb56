//! Usage signals emitted after a calculation or a restore.
//!
//! Amounts never leave the process; totals and income ratios are reduced to
//! coarse buckets first. Delivery is best effort: a failing sink is logged
//! at debug level and otherwise ignored.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{CalculationResult, FieldError, FieldId};
use crate::restore::RestoreSourceKind;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("analytics delivery failed: {0}")]
pub struct AnalyticsError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Success,
    Error,
}

/// Why a Calculate press did not produce a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculateErrorType {
    MissingExpense,
    MissingSalary,
    ValidationError,
}

impl CalculateErrorType {
    /// A missing expense outranks a salary problem, which outranks anything
    /// else.
    pub fn classify(errors: &[FieldError]) -> Self {
        if errors.iter().any(|e| e.field == FieldId::ExpensesGlobal) {
            Self::MissingExpense
        } else if errors.iter().any(|e| e.field.is_salary()) {
            Self::MissingSalary
        } else {
            Self::ValidationError
        }
    }
}

/// Shape of a successful calculation, without any amounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultSummary {
    pub expense_count: usize,
    pub has_names: bool,
    pub has_labels: bool,
    pub total_expense_bucket: &'static str,
}

impl ResultSummary {
    pub fn of(result: &CalculationResult) -> Self {
        Self {
            expense_count: result.expense_breakdown.len(),
            has_names: result.has_custom_names(),
            has_labels: result.has_custom_labels(),
            total_expense_bucket: bucket_expense_amount(result.total_expenses),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AnalyticsEvent {
    CalculateAttempt {
        status: AttemptStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_type: Option<CalculateErrorType>,
        #[serde(flatten)]
        summary: Option<ResultSummary>,
        returning_user: bool,
    },
    ValidationError {
        error_count: usize,
        /// Comma-joined field keys.
        error_fields: String,
        /// Comma-joined distinct error families.
        error_types: String,
        returning_user: bool,
    },
    ResultsViewed {
        expense_count: usize,
        has_names: bool,
        has_labels: bool,
        total_expense_bucket: &'static str,
        split_ratio_bucket: &'static str,
        returning_user: bool,
    },
    DataRestored {
        source: RestoreSourceKind,
        has_names: bool,
        has_salaries: bool,
        has_expenses: bool,
        expense_count: usize,
    },
    ExpenseAdded {
        expense_count_after: usize,
        expense_row_index: usize,
    },
    ExpenseDeleted {
        expense_count_after: usize,
        expense_row_index: usize,
    },
    CurrencyChanged {
        currency_code: String,
    },
}

impl AnalyticsEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CalculateAttempt { .. } => "calculate_attempt",
            Self::ValidationError { .. } => "validation_error",
            Self::ResultsViewed { .. } => "results_viewed",
            Self::DataRestored { .. } => "data_restored",
            Self::ExpenseAdded { .. } => "expense_added",
            Self::ExpenseDeleted { .. } => "expense_deleted",
            Self::CurrencyChanged { .. } => "currency_changed",
        }
    }

    pub fn attempt_failed(
        errors: &[FieldError],
        returning_user: bool,
    ) -> Self {
        Self::CalculateAttempt {
            status: AttemptStatus::Error,
            error_type: Some(CalculateErrorType::classify(errors)),
            summary: None,
            returning_user,
        }
    }

    pub fn attempt_succeeded(
        result: &CalculationResult,
        returning_user: bool,
    ) -> Self {
        Self::CalculateAttempt {
            status: AttemptStatus::Success,
            error_type: None,
            summary: Some(ResultSummary::of(result)),
            returning_user,
        }
    }

    pub fn validation_failed(
        errors: &[FieldError],
        returning_user: bool,
    ) -> Self {
        let mut types: Vec<&'static str> = Vec::new();
        for e in errors {
            let t = e.field.error_type();
            if !types.contains(&t) {
                types.push(t);
            }
        }
        Self::ValidationError {
            error_count: errors.len(),
            error_fields: errors
                .iter()
                .map(|e| e.field.to_string())
                .collect::<Vec<_>>()
                .join(","),
            error_types: types.join(","),
            returning_user,
        }
    }

    pub fn results_viewed(
        result: &CalculationResult,
        returning_user: bool,
    ) -> Self {
        let summary = ResultSummary::of(result);
        Self::ResultsViewed {
            expense_count: summary.expense_count,
            has_names: summary.has_names,
            has_labels: summary.has_labels,
            total_expense_bucket: summary.total_expense_bucket,
            split_ratio_bucket: bucket_split_ratio(result.person1_income, result.person2_income),
            returning_user,
        }
    }
}

/// Receiver for analytics events.
pub trait AnalyticsSink: Send + Sync {
    fn track(&self, event: &AnalyticsEvent) -> Result<(), AnalyticsError>;
}

/// Writes events to the log under the `analytics` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl AnalyticsSink for TracingSink {
    fn track(&self, event: &AnalyticsEvent) -> Result<(), AnalyticsError> {
        let payload = serde_json::to_string(event).map_err(|e| AnalyticsError(e.to_string()))?;
        info!(target: "analytics", event = event.name(), %payload);
        Ok(())
    }
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl AnalyticsSink for NoopSink {
    fn track(&self, _event: &AnalyticsEvent) -> Result<(), AnalyticsError> {
        Ok(())
    }
}

/// Sends an event, swallowing any failure.
pub fn emit(
    sink: &dyn AnalyticsSink,
    event: AnalyticsEvent,
) {
    if let Err(e) = sink.track(&event) {
        debug!(event = event.name(), error = %e, "analytics event dropped");
    }
}

/// Total expense bucket: `0-100`, `100-250`, `250-500`, `500-1000` or `1000+`.
pub fn bucket_expense_amount(total: Decimal) -> &'static str {
    if total < dec!(100) {
        "0-100"
    } else if total < dec!(250) {
        "100-250"
    } else if total < dec!(500) {
        "250-500"
    } else if total < dec!(1000) {
        "500-1000"
    } else {
        "1000+"
    }
}

/// Buckets the first person's share of combined income.
///
/// Only ratios where the first person earns roughly half or more get a
/// named bucket; everything else is `other`.
pub fn bucket_split_ratio(
    income1: Decimal,
    income2: Decimal,
) -> &'static str {
    let combined = income1 + income2;
    if combined.is_zero() {
        return "other";
    }
    let ratio = income1 / combined;
    if ratio >= dec!(0.45) && ratio < dec!(0.55) {
        "50-50"
    } else if ratio >= dec!(0.55) && ratio < dec!(0.65) {
        "60-40"
    } else if ratio >= dec!(0.65) && ratio < dec!(0.75) {
        "70-30"
    } else if ratio >= dec!(0.75) && ratio < dec!(0.85) {
        "80-20"
    } else {
        "other"
    }
}
