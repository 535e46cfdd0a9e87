//! Sales domain module.
//!
//! Transactions (with their line items) and the aggregate report derived from
//! the set of paid transactions. Pure domain logic only (no IO, no HTTP, no
//! storage).

pub mod report;
pub mod transaction;

pub use report::{AggregateReport, CategorySummary, REPORT_ID, ReportTotals};
pub use transaction::{
    CreateTransaction, PaymentOutcome, Transaction, TransactionDetail, TransactionItem,
};
