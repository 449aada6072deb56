//! A single calculator session: the form, its persistence, and the events it
//! reports.
//!
//! The session is the only writer of its state. Restores are asynchronous,
//! so each one is handed a ticket; a restore that finishes after the session
//! was torn down, or after a newer restore began, is thrown away.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::analytics::{self, AnalyticsEvent, AnalyticsSink};
use super::debounce::SnapshotWriter;
use super::state::{Action, CalculatorState};
use crate::calculations::{SplitCalculator, SplitInput, build_expenses_payload, parse_amount, validate_form};
use crate::models::{CalculationResult, Currency, FieldError, SharePayload, Step};
use crate::restore::RestoreOutcome;

/// Identifies one restore attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct RestoreTicket(u64);

pub struct Calculator {
    state: CalculatorState,
    currency: Currency,
    analytics: Arc<dyn AnalyticsSink>,
    writer: Option<SnapshotWriter>,
    generation: u64,
    torn_down: bool,
    persistence_enabled: bool,
    returning_user: bool,
    notice: Option<String>,
}

impl Calculator {
    pub fn new(
        currency: Currency,
        analytics: Arc<dyn AnalyticsSink>,
    ) -> Self {
        Self {
            state: CalculatorState::new(),
            currency,
            analytics,
            writer: None,
            generation: 0,
            torn_down: false,
            persistence_enabled: false,
            returning_user: false,
            notice: None,
        }
    }

    /// Persists edits through `writer` once the initial restore settles.
    pub fn with_writer(mut self, writer: SnapshotWriter) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn state(&self) -> &CalculatorState {
        &self.state
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn result(&self) -> Option<&CalculationResult> {
        self.state.result.as_ref()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.state.errors
    }

    pub fn is_returning_user(&self) -> bool {
        self.returning_user
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Returns and clears the pending notice.
    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    /// The form as it would be shared.
    pub fn share_payload(&self) -> SharePayload {
        SharePayload::from_form(&self.state.form, Some(self.currency.code()))
    }

    pub fn dispatch(&mut self, action: Action) {
        let before = self.state.form.expenses.clone();
        let tracked = match &action {
            Action::AddExpense => Some(true),
            Action::DeleteExpense(_) => Some(false),
            _ => None,
        };
        self.state.apply(action);

        match tracked {
            Some(true) if self.state.form.expenses.len() > before.len() => {
                let count = self.state.form.expenses.len();
                self.track(AnalyticsEvent::ExpenseAdded {
                    expense_count_after: count,
                    expense_row_index: count - 1,
                });
            }
            Some(false) if self.state.form.expenses.len() < before.len() => {
                let index = before
                    .iter()
                    .position(|row| self.state.form.row(row.id).is_none())
                    .unwrap_or_default();
                self.track(AnalyticsEvent::ExpenseDeleted {
                    expense_count_after: self.state.form.expenses.len(),
                    expense_row_index: index,
                });
            }
            _ => {}
        }

        self.persist();
    }

    /// Validates and, when the form is complete, computes the split and
    /// moves to the results step.
    pub fn calculate(&mut self) -> Option<&CalculationResult> {
        let outcome = validate_form(&self.state.form);
        if !outcome.is_valid() {
            debug!(errors = outcome.errors.len(), "form is incomplete");
            self.track(AnalyticsEvent::validation_failed(&outcome.errors, self.returning_user));
            self.track(AnalyticsEvent::attempt_failed(&outcome.errors, self.returning_user));
            self.state.apply(Action::SetResult(None));
            self.state.apply(Action::SetValidationErrors(outcome.errors));
            return None;
        }

        let form = &self.state.form;
        let input = SplitInput {
            person1_income: parse_amount(&form.person1_salary).unwrap_or_default(),
            person2_income: parse_amount(&form.person2_salary).unwrap_or_default(),
            expenses: build_expenses_payload(&form.expenses),
            person1_name: form.person1_name.clone(),
            person2_name: form.person2_name.clone(),
        };

        match SplitCalculator::new().calculate(&input) {
            Ok(result) => {
                self.track(AnalyticsEvent::attempt_succeeded(&result, self.returning_user));
                self.track(AnalyticsEvent::results_viewed(&result, self.returning_user));
                self.state.apply(Action::SetValidationErrors(Vec::new()));
                self.state.apply(Action::SetResult(Some(result)));
                self.state.apply(Action::SetStep(Step::Results));
                self.state.result.as_ref()
            }
            Err(e) => {
                warn!(error = %e, "split could not be computed");
                self.state.apply(Action::SetResult(None));
                self.notice = Some(e.to_string());
                None
            }
        }
    }

    /// Back to the input step. The result is kept; errors are cleared.
    pub fn back_to_edit(&mut self) {
        self.state.apply(Action::SetValidationErrors(Vec::new()));
        self.state.apply(Action::SetStep(Step::Input));
    }

    pub fn set_currency(&mut self, currency: Currency) {
        if currency == self.currency {
            return;
        }
        self.currency = currency;
        self.track(AnalyticsEvent::CurrencyChanged {
            currency_code: currency.code().to_string(),
        });
        if let Some(writer) = &self.writer {
            writer.save_currency(currency);
        }
        self.persist();
    }

    /// Starts a restore. Any restore begun earlier becomes stale.
    pub fn begin_restore(&mut self) -> RestoreTicket {
        self.generation += 1;
        RestoreTicket(self.generation)
    }

    /// Applies the outcome of the restore identified by `ticket`.
    ///
    /// Returns `false` when the outcome was discarded because the session
    /// was torn down or a newer restore has started. Whatever the outcome,
    /// persistence is switched on afterwards.
    pub fn finish_restore(
        &mut self,
        ticket: RestoreTicket,
        outcome: RestoreOutcome,
    ) -> bool {
        if self.torn_down || ticket.0 != self.generation {
            debug!(ticket = ticket.0, current = self.generation, "discarding stale restore");
            return false;
        }

        match outcome {
            RestoreOutcome::Restored { source, payload } => {
                if let Some(currency) = payload.currency.as_deref().and_then(Currency::parse) {
                    self.currency = currency;
                }
                self.track(AnalyticsEvent::DataRestored {
                    source,
                    has_names: payload.has_names(),
                    has_salaries: payload.has_salaries(),
                    has_expenses: payload.filled_expense_count() > 0,
                    expense_count: payload.filled_expense_count(),
                });
                self.state.apply(Action::Restore(payload));
                self.returning_user = true;
                info!(%source, "session restored");
            }
            RestoreOutcome::Failed { source, notice } => {
                info!(%source, "restore failed, starting empty");
                self.notice = Some(notice);
            }
            RestoreOutcome::Nothing => {}
        }

        self.persistence_enabled = true;
        self.persist();
        true
    }

    /// Stops the session. Pending restores are discarded from here on and
    /// the final snapshot is written.
    pub async fn teardown(&mut self) {
        self.torn_down = true;
        if let Some(writer) = self.writer.take() {
            writer.shutdown().await;
        }
    }

    fn persist(&self) {
        if !self.persistence_enabled || self.torn_down {
            return;
        }
        if let Some(writer) = &self.writer {
            writer.schedule(SharePayload::local_snapshot(
                &self.state.form,
                Some(self.currency.code()),
            ));
        }
    }

    fn track(&self, event: AnalyticsEvent) {
        analytics::emit(self.analytics.as_ref(), event);
    }
}
