mod calculation_result;
mod configuration;
mod currency;
mod expense;
mod field_error;
mod form;
mod share_payload;

pub use calculation_result::{CalculationResult, ExpenseShare};
pub use configuration::{
    ConfigurationDetail, ConfigurationId, ConfigurationSummary, HouseholdId, NewConfiguration,
    SavedExpense, UserId,
};
pub use currency::{Currency, is_currency_code, normalize_currency_code};
pub use expense::{ExpenseItem, ExpenseRow, RawExpense, RowId};
pub use field_error::{FieldError, FieldId};
pub use form::{FormSnapshot, Person, Step};
pub use share_payload::{MAX_RESTORED_EXPENSES, SharePayload, SharedExpense, coerce_expenses};
