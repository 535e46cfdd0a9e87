//! Persistence ports and their adapters.
//!
//! Every store comes in two flavours with identical semantics:
//!
//! - `InMemoryStore`: process-local maps, used by tests and when no database
//!   URL is configured
//! - `PostgresStore`: sqlx over a Postgres pool
//!
//! ## Image status writes
//!
//! `advance_*_image` only succeeds when the stored status is one of
//! [`ImageStatus::transition_sources`] for the requested status. A write that
//! would move the status backwards fails with `StoreError::InvalidTransition`
//! and leaves the row untouched.
//!
//! ## Report unit of work
//!
//! [`ReportStore::begin`] opens one atomic unit of work. The first call on it
//! must be [`ReportUnitOfWork::lock_report`], which takes the exclusive lock on
//! the single report row; the lock is held until `commit` or `rollback` (or
//! until the unit of work is dropped, which rolls back).

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;

use storefront_core::{DomainError, ImageStatus, ProductId, TransactionId, UserId};
use storefront_products::Product;
use storefront_sales::{AggregateReport, PaymentOutcome, ReportTotals, Transaction};
use storefront_users::User;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("referenced record does not exist: {0}")]
    MissingReference(String),

    #[error("invalid image status transition: {0}")]
    InvalidTransition(String),

    #[error("stored data is corrupt: {0}")]
    Corrupt(String),

    #[error("report row is not locked by this unit of work")]
    NotLocked,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<DomainError> for StoreError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound(_) => StoreError::NotFound,
            DomainError::Conflict(msg) => StoreError::Conflict(msg),
            DomainError::InvariantViolation(msg) => StoreError::InvalidTransition(msg),
            other => StoreError::Corrupt(other.to_string()),
        }
    }
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Guarded status write. `url: None` keeps the stored URL.
    async fn advance_product_image(
        &self,
        id: ProductId,
        next: ImageStatus,
        url: Option<&str>,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Persist a profile edit (name, status, URL).
    ///
    /// Fails with `Conflict` unless the stored status still equals
    /// `expected_status`, so two concurrent edits cannot both start an upload.
    async fn save_profile(&self, user: &User, expected_status: ImageStatus) -> Result<(), StoreError>;

    async fn advance_user_image(
        &self,
        id: UserId,
        next: ImageStatus,
        url: Option<&str>,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Insert a transaction with its line items atomically. The owning user
    /// must exist.
    async fn insert_transaction(&self, tx: &Transaction) -> Result<(), StoreError>;

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError>;

    /// Flip `is_paid` to true. The returned outcome says whether this call made
    /// the change. Unknown ids fail with `NotFound`.
    async fn mark_paid(&self, id: TransactionId) -> Result<PaymentOutcome, StoreError>;
}

/// One atomic read-recompute-replace cycle over the report row.
#[async_trait]
pub trait ReportUnitOfWork: Send {
    /// Take the exclusive row lock and return the row as stored.
    async fn lock_report(&mut self) -> Result<AggregateReport, StoreError>;

    /// Totals over the paid transactions, read from one consistent snapshot
    /// taken after the lock was acquired.
    async fn paid_totals(&mut self) -> Result<ReportTotals, StoreError>;

    /// Stage a full replacement of the row.
    async fn write_report(&mut self, report: &AggregateReport) -> Result<(), StoreError>;

    async fn commit(&mut self) -> Result<(), StoreError>;

    async fn rollback(&mut self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn ReportUnitOfWork>, StoreError>;

    /// Read the row without locking it.
    async fn load_report(&self) -> Result<AggregateReport, StoreError>;
}
