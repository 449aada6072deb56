use tracing::debug;

use crate::calculations::format::{format_with_thousands, sanitize_text};
use crate::models::{
    CalculationResult, ExpenseRow, FieldError, FieldId, FormSnapshot, Person, RowId, SharePayload,
    Step,
};

pub const MAX_NAME_INPUT: usize = 50;
pub const MAX_LABEL_INPUT: usize = 1000;

/// Everything the form reducer understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SetName { person: Person, value: String },
    SetSalary { person: Person, value: String },
    ToggleSalaryVisibility(Person),
    SetExpenseAmount { id: RowId, value: String },
    SetExpenseLabel { id: RowId, value: String },
    AddExpense,
    DeleteExpense(RowId),
    SetStep(Step),
    SetResult(Option<CalculationResult>),
    SetValidationErrors(Vec<FieldError>),
    /// Replaces names, salaries and rows with restored values.
    Restore(SharePayload),
}

/// The form plus what was derived from it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalculatorState {
    pub form: FormSnapshot,
    pub errors: Vec<FieldError>,
    pub result: Option<CalculationResult>,
}

impl CalculatorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> Step {
        self.form.step
    }

    pub fn error_for(
        &self,
        field: FieldId,
    ) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    /// Applies one action.
    ///
    /// Edits are sanitized or formatted on the way in and clear any
    /// displayed errors. The first row and the last remaining row cannot be
    /// deleted. `Results` is refused while there is no result.
    pub fn apply(&mut self, action: Action) {
        match action {
            Action::SetName { person, value } => {
                *self.name_mut(person) = sanitize_text(&value, MAX_NAME_INPUT);
                self.errors.clear();
            }
            Action::SetSalary { person, value } => {
                *self.salary_mut(person) = format_with_thousands(&value);
                self.errors.clear();
            }
            Action::ToggleSalaryVisibility(person) => {
                let visible = match person {
                    Person::First => &mut self.form.person1_salary_visible,
                    Person::Second => &mut self.form.person2_salary_visible,
                };
                *visible = !*visible;
            }
            Action::SetExpenseAmount { id, value } => {
                if let Some(row) = self.form.row_mut(id) {
                    row.amount = format_with_thousands(&value);
                }
                self.errors.clear();
            }
            Action::SetExpenseLabel { id, value } => {
                if let Some(row) = self.form.row_mut(id) {
                    row.label = sanitize_text(&value, MAX_LABEL_INPUT);
                }
                self.errors.clear();
            }
            Action::AddExpense => {
                let row = self.form.new_row();
                debug!(row = %row.id, "expense row added");
                self.form.expenses.push(row);
            }
            Action::DeleteExpense(id) => {
                if self.form.expenses.len() <= 1 || self.form.expenses[0].id == id {
                    return;
                }
                self.form.expenses.retain(|row| row.id != id);
                self.errors.clear();
            }
            Action::SetStep(step) => {
                self.form.step = match step {
                    Step::Results if self.result.is_none() => {
                        debug!("no result to show, staying on input");
                        Step::Input
                    }
                    other => other,
                };
            }
            Action::SetResult(result) => {
                self.result = result;
                if self.result.is_none() {
                    self.form.step = Step::Input;
                }
            }
            Action::SetValidationErrors(errors) => {
                self.errors = errors;
            }
            Action::Restore(payload) => self.restore(payload),
        }
    }

    // Restored values are taken as-is; validation judges them.
    fn restore(&mut self, payload: SharePayload) {
        let SharePayload {
            name1,
            name2,
            salary1,
            salary2,
            expenses,
            ..
        } = payload;
        let form = &mut self.form;
        form.person1_name = name1;
        form.person2_name = name2;
        form.person1_salary = salary1;
        form.person2_salary = salary2;

        let mut rows: Vec<ExpenseRow> = Vec::with_capacity(expenses.len().max(1));
        for expense in expenses {
            let mut row = form.new_row();
            row.amount = expense.amount;
            row.label = expense.label;
            rows.push(row);
        }
        if rows.is_empty() {
            rows.push(form.new_row());
        }
        form.expenses = rows;
        form.step = Step::Input;

        self.errors.clear();
        self.result = None;
        debug!(rows = self.form.expenses.len(), "form restored");
    }

    fn name_mut(
        &mut self,
        person: Person,
    ) -> &mut String {
        match person {
            Person::First => &mut self.form.person1_name,
            Person::Second => &mut self.form.person2_name,
        }
    }

    fn salary_mut(
        &mut self,
        person: Person,
    ) -> &mut String {
        match person {
            Person::First => &mut self.form.person1_salary,
            Person::Second => &mut self.form.person2_salary,
        }
    }
}
