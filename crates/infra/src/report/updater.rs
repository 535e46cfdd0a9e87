//! Recomputes the aggregate transaction report after payments.
//!
//! Every refresh runs one unit of work: lock the report row, aggregate the
//! paid transactions, replace the row, commit. Concurrent refreshes serialize
//! on the row lock and each one reads a snapshot taken after it holds the
//! lock, so the refresh that commits last always reflects every payment that
//! committed before it started. Any failure rolls the unit back and leaves the
//! stored row as it was.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use storefront_core::TransactionId;
use storefront_sales::AggregateReport;

use crate::jobs::{JobKind, JobTracker};
use crate::persistence::{ReportStore, ReportUnitOfWork, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("could not open report unit of work: {0}")]
    Begin(#[source] StoreError),

    #[error("could not lock report row: {0}")]
    Lock(#[source] StoreError),

    #[error("could not aggregate paid transactions: {0}")]
    Aggregate(#[source] StoreError),

    #[error("could not write report row: {0}")]
    Write(#[source] StoreError),

    #[error("could not commit report: {0}")]
    Commit(#[source] StoreError),
}

#[derive(Clone)]
pub struct ReportUpdater {
    store: Arc<dyn ReportStore>,
}

impl std::fmt::Debug for ReportUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportUpdater").finish_non_exhaustive()
    }
}

impl ReportUpdater {
    pub fn new(store: Arc<dyn ReportStore>) -> Self {
        Self { store }
    }

    /// Recompute and replace the report. `trigger` is the transaction whose
    /// payment caused the refresh; it only feeds the logs.
    #[instrument(skip(self, trigger), fields(trigger = %trigger), err)]
    pub async fn refresh(&self, trigger: TransactionId) -> Result<AggregateReport, ReportError> {
        let mut work = self.store.begin().await.map_err(ReportError::Begin)?;

        match recompute(&mut *work).await {
            Ok(report) => {
                if let Err(e) = work.commit().await {
                    rollback(&mut *work).await;
                    return Err(ReportError::Commit(e));
                }
                info!(
                    revenue = report.totals.total_revenue,
                    paid_transactions = report.totals.total_paid_transactions,
                    "report refreshed"
                );
                Ok(report)
            }
            Err(e) => {
                rollback(&mut *work).await;
                Err(e)
            }
        }
    }

    /// Register a refresh with `tracker` and run it in the background.
    ///
    /// Failures are logged; the stored report keeps its previous value.
    pub fn spawn_refresh(&self, tracker: &JobTracker, trigger: TransactionId) -> JoinHandle<()> {
        let updater = self.clone();
        tracker.spawn(JobKind::ReportRefresh, trigger.to_string(), move |job| async move {
            if let Err(e) = updater.refresh(trigger).await {
                error!(job_id = %job.id, error = %e, "report refresh failed");
            }
        })
    }
}

async fn recompute(work: &mut dyn ReportUnitOfWork) -> Result<AggregateReport, ReportError> {
    let mut report = work.lock_report().await.map_err(ReportError::Lock)?;
    let totals = work.paid_totals().await.map_err(ReportError::Aggregate)?;
    report.replace(totals, Utc::now());
    work.write_report(&report).await.map_err(ReportError::Write)?;
    Ok(report)
}

async fn rollback(work: &mut dyn ReportUnitOfWork) {
    if let Err(e) = work.rollback().await {
        warn!(error = %e, "report rollback failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use storefront_core::{ProductCategory, ProductId, UserId};
    use storefront_sales::{CreateTransaction, ReportTotals, Transaction, TransactionItem};
    use storefront_users::{CreateUser, User};

    use crate::persistence::{InMemoryStore, TransactionRepository, UserRepository};

    async fn user(store: &InMemoryStore, email: &str) -> UserId {
        let u = User::create(
            CreateUser {
                name: "Buyer".into(),
                email: email.into(),
            },
            Utc::now(),
        )
        .unwrap();
        store.insert_user(&u).await.unwrap();
        u.id
    }

    async fn transaction(
        store: &InMemoryStore,
        user_id: UserId,
        lines: &[(ProductCategory, u16, u32)],
    ) -> TransactionId {
        let tx = Transaction::create(
            CreateTransaction {
                user_id,
                items: lines
                    .iter()
                    .map(|&(category, qty, price)| TransactionItem {
                        product_id: ProductId::new(),
                        product_name: category.name().to_lowercase(),
                        category,
                        qty,
                        price,
                    })
                    .collect(),
                note: String::new(),
            },
            Utc::now(),
        )
        .unwrap();
        store.insert_transaction(&tx).await.unwrap();
        tx.id
    }

    #[tokio::test]
    async fn refresh_aggregates_paid_transactions_only() {
        let store = InMemoryStore::new();
        let alice = user(&store, "alice@example.com").await;
        let bob = user(&store, "bob@example.com").await;

        let t1 = transaction(&store, alice, &[(ProductCategory::Goods, 2, 50)]).await;
        let t2 = transaction(&store, bob, &[(ProductCategory::Service, 1, 50)]).await;
        let _unpaid = transaction(&store, bob, &[(ProductCategory::Goods, 9, 100)]).await;
        store.mark_paid(t1).await.unwrap();
        store.mark_paid(t2).await.unwrap();

        let updater = ReportUpdater::new(Arc::new(store.clone()));
        let report = updater.refresh(t2).await.unwrap();

        assert_eq!(report.totals.total_revenue, 150);
        assert_eq!(report.totals.total_paid_transactions, 2);
        assert_eq!(report.totals.total_products_sold, 3);
        assert_eq!(report.totals.total_unique_customers, 2);
        assert_eq!(report.totals.category_summary.get("Goods"), Some(&2));
        assert_eq!(report.totals.category_summary.get("Service"), Some(&1));
        assert!(report.updated_at.is_some());
        assert_eq!(store.load_report().await.unwrap(), report);
    }

    #[tokio::test]
    async fn refreshing_twice_without_payments_is_stable() {
        let store = InMemoryStore::new();
        let buyer = user(&store, "c@example.com").await;
        let t = transaction(&store, buyer, &[(ProductCategory::Subscription, 1, 30)]).await;
        store.mark_paid(t).await.unwrap();

        let updater = ReportUpdater::new(Arc::new(store.clone()));
        let first = updater.refresh(t).await.unwrap();
        let second = updater.refresh(t).await.unwrap();
        assert_eq!(first.totals, second.totals);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_refreshes_converge_on_full_totals() {
        let store = InMemoryStore::new();
        let updater = ReportUpdater::new(Arc::new(store.clone()));
        let tracker = JobTracker::new();

        let mut expected_revenue = 0u64;
        for i in 0..20u32 {
            let buyer = user(&store, &format!("buyer{i}@example.com")).await;
            let price = 10 + i;
            let t = transaction(&store, buyer, &[(ProductCategory::Goods, 1, price)]).await;
            store.mark_paid(t).await.unwrap();
            expected_revenue += u64::from(price);
            updater.spawn_refresh(&tracker, t);
        }
        tracker.wait_drained().await;

        let report = store.load_report().await.unwrap();
        assert_eq!(report.totals.total_revenue, expected_revenue);
        assert_eq!(report.totals.total_paid_transactions, 20);
        assert_eq!(report.totals.total_unique_customers, 20);
        assert_eq!(report.totals.category_summary.get("Goods"), Some(&20));
    }

    /// Report store whose aggregation step always fails.
    struct FailingTotals {
        inner: InMemoryStore,
    }

    struct FailingWork {
        inner: Box<dyn ReportUnitOfWork>,
    }

    #[async_trait]
    impl ReportUnitOfWork for FailingWork {
        async fn lock_report(&mut self) -> Result<AggregateReport, StoreError> {
            self.inner.lock_report().await
        }

        async fn paid_totals(&mut self) -> Result<ReportTotals, StoreError> {
            Err(StoreError::Corrupt("aggregation exploded".into()))
        }

        async fn write_report(&mut self, report: &AggregateReport) -> Result<(), StoreError> {
            self.inner.write_report(report).await
        }

        async fn commit(&mut self) -> Result<(), StoreError> {
            self.inner.commit().await
        }

        async fn rollback(&mut self) -> Result<(), StoreError> {
            self.inner.rollback().await
        }
    }

    #[async_trait]
    impl ReportStore for FailingTotals {
        async fn begin(&self) -> Result<Box<dyn ReportUnitOfWork>, StoreError> {
            Ok(Box::new(FailingWork {
                inner: self.inner.begin().await?,
            }))
        }

        async fn load_report(&self) -> Result<AggregateReport, StoreError> {
            self.inner.load_report().await
        }
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_report_and_releases_lock() {
        let store = InMemoryStore::new();
        let buyer = user(&store, "d@example.com").await;
        let t = transaction(&store, buyer, &[(ProductCategory::Goods, 1, 70)]).await;
        store.mark_paid(t).await.unwrap();

        let good = ReportUpdater::new(Arc::new(store.clone()));
        let before = good.refresh(t).await.unwrap();

        let broken = ReportUpdater::new(Arc::new(FailingTotals {
            inner: store.clone(),
        }));
        let err = broken.refresh(t).await.unwrap_err();
        assert!(matches!(err, ReportError::Aggregate(_)));
        assert_eq!(store.load_report().await.unwrap(), before);

        // The row lock was released, so a healthy refresh still goes through.
        tokio::time::timeout(std::time::Duration::from_millis(200), good.refresh(t))
            .await
            .expect("row lock released")
            .unwrap();
    }

    #[tokio::test]
    async fn spawned_failure_still_drains() {
        let store = InMemoryStore::new();
        let broken = ReportUpdater::new(Arc::new(FailingTotals { inner: store }));
        let tracker = JobTracker::new();

        broken.spawn_refresh(&tracker, TransactionId::new());
        tokio::time::timeout(std::time::Duration::from_millis(200), tracker.wait_drained())
            .await
            .expect("failed refresh is still a finished job");
    }
}
