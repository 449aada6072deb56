//! Money parsing, form validation and the proportional split itself.
//!
//! Everything in this module is pure: no I/O and no shared state.

pub mod common;
pub mod format;
pub mod payload;
pub mod split;
pub mod validation;

pub use format::{format_currency, format_with_thousands, parse_amount, sanitize_text};
pub use payload::{build_expenses_payload, build_pending_save};
pub use split::{
    DEFAULT_EXPENSE_LABEL, DEFAULT_PERSON1_NAME, DEFAULT_PERSON2_NAME, SplitCalculator, SplitError,
    SplitInput, calculate_shares,
};
pub use validation::{ValidationOutcome, validate_form};
