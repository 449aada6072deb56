//! Interactive calculator session: form reducer, restore bookkeeping,
//! debounced persistence and usage events.

pub mod analytics;
pub mod debounce;
pub mod session;
pub mod state;

pub use analytics::{
    AnalyticsError, AnalyticsEvent, AnalyticsSink, AttemptStatus, CalculateErrorType, NoopSink,
    ResultSummary, TracingSink, bucket_expense_amount, bucket_split_ratio,
};
pub use debounce::{DEFAULT_DEBOUNCE, SnapshotWriter};
pub use session::{Calculator, RestoreTicket};
pub use state::{Action, CalculatorState, MAX_LABEL_INPUT, MAX_NAME_INPUT};
