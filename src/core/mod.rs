pub mod gains;
pub mod lots;
pub mod report;
pub mod transaction;

// Flat public surface for domain types and functions.
pub use gains::{calculate_gains, Totals};
pub use lots::Algorithm;
pub use report::GainReport;
pub use transaction::{Transaction, TransactionError, TransactionRecord, TransactionType};
