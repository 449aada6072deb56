use serde::{Deserialize, Serialize};

use super::{ExpenseRow, RowId};

/// Which half of the calculator is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    #[default]
    Input,
    Results,
}

/// The two people being compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Person {
    First,
    Second,
}

/// Everything the user can edit, exactly as typed.
///
/// A fresh form has one blank expense row, and no operation ever leaves it
/// with zero rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSnapshot {
    pub person1_name: String,
    pub person2_name: String,
    pub person1_salary: String,
    pub person2_salary: String,
    pub person1_salary_visible: bool,
    pub person2_salary_visible: bool,
    pub expenses: Vec<ExpenseRow>,
    pub step: Step,
    next_row_id: u64,
}

impl FormSnapshot {
    pub fn new() -> Self {
        let mut form = Self {
            person1_name: String::new(),
            person2_name: String::new(),
            person1_salary: String::new(),
            person2_salary: String::new(),
            person1_salary_visible: false,
            person2_salary_visible: false,
            expenses: Vec::new(),
            step: Step::Input,
            next_row_id: 1,
        };
        let row = form.new_row();
        form.expenses.push(row);
        form
    }

    /// Hands out a blank row with an id this form has never used.
    pub fn new_row(&mut self) -> ExpenseRow {
        let id = RowId(self.next_row_id);
        self.next_row_id += 1;
        ExpenseRow::blank(id)
    }

    pub fn name(
        &self,
        person: Person,
    ) -> &str {
        match person {
            Person::First => &self.person1_name,
            Person::Second => &self.person2_name,
        }
    }

    pub fn salary(
        &self,
        person: Person,
    ) -> &str {
        match person {
            Person::First => &self.person1_salary,
            Person::Second => &self.person2_salary,
        }
    }

    pub fn row(
        &self,
        id: RowId,
    ) -> Option<&ExpenseRow> {
        self.expenses.iter().find(|row| row.id == id)
    }

    pub(crate) fn row_mut(
        &mut self,
        id: RowId,
    ) -> Option<&mut ExpenseRow> {
        self.expenses.iter_mut().find(|row| row.id == id)
    }
}

impl Default for FormSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn new_form_has_one_blank_row() {
        let form = FormSnapshot::new();

        assert_eq!(form.expenses.len(), 1);
        assert_eq!(form.expenses[0], ExpenseRow::blank(RowId(1)));
        assert_eq!(form.step, Step::Input);
    }

    #[test]
    fn new_row_never_repeats_an_id() {
        let mut form = FormSnapshot::new();

        let a = form.new_row();
        let b = form.new_row();

        assert_eq!(a.id, RowId(2));
        assert_eq!(b.id, RowId(3));
    }
}
