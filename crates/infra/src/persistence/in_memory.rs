//! Process-local store behind every persistence port.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use storefront_core::{ImageStatus, ProductId, TransactionId, Uploadable, UserId};
use storefront_products::Product;
use storefront_sales::{AggregateReport, PaymentOutcome, ReportTotals, Transaction};
use storefront_users::User;

use super::{
    ProductRepository, ReportStore, ReportUnitOfWork, StoreError, TransactionRepository,
    UserRepository,
};

#[derive(Debug, Default)]
struct State {
    products: RwLock<HashMap<ProductId, Product>>,
    users: RwLock<HashMap<UserId, User>>,
    transactions: RwLock<HashMap<TransactionId, Transaction>>,
    report: RwLock<AggregateReport>,
    /// Row lock for the report, held by one unit of work at a time.
    report_lock: Arc<Mutex<()>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory implementation of every repository and the report store.
///
/// Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductRepository for InMemoryStore {
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut products = write(&self.state.products);
        if products.contains_key(&product.id) {
            return Err(StoreError::Conflict(format!("product {} already exists", product.id)));
        }
        products.insert(product.id, product.clone());
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(read(&self.state.products).get(&id).cloned())
    }

    async fn advance_product_image(
        &self,
        id: ProductId,
        next: ImageStatus,
        url: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut products = write(&self.state.products);
        let product = products.get_mut(&id).ok_or(StoreError::NotFound)?;
        product.advance_image(next, url.map(str::to_owned))?;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut users = write(&self.state.users);
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!("email {} is already registered", user.email)));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(read(&self.state.users).get(&id).cloned())
    }

    async fn save_profile(&self, user: &User, expected_status: ImageStatus) -> Result<(), StoreError> {
        let mut users = write(&self.state.users);
        let stored = users.get_mut(&user.id).ok_or(StoreError::NotFound)?;
        if stored.image_status != expected_status {
            return Err(StoreError::Conflict(format!(
                "avatar status changed to {} while the profile was being edited",
                stored.image_status
            )));
        }
        stored.name = user.name.clone();
        stored.image_status = user.image_status;
        stored.avatar_url = user.avatar_url.clone();
        stored.updated_at = user.updated_at;
        Ok(())
    }

    async fn advance_user_image(
        &self,
        id: UserId,
        next: ImageStatus,
        url: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut users = write(&self.state.users);
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.advance_image(next, url.map(str::to_owned))?;
        Ok(())
    }
}

#[async_trait]
impl TransactionRepository for InMemoryStore {
    async fn insert_transaction(&self, tx: &Transaction) -> Result<(), StoreError> {
        if !read(&self.state.users).contains_key(&tx.user_id) {
            return Err(StoreError::MissingReference(format!("user {}", tx.user_id)));
        }
        let mut transactions = write(&self.state.transactions);
        if transactions
            .values()
            .any(|t| t.invoice_code == tx.invoice_code)
        {
            return Err(StoreError::Conflict(format!(
                "invoice code {} already exists",
                tx.invoice_code
            )));
        }
        transactions.insert(tx.id, tx.clone());
        Ok(())
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        Ok(read(&self.state.transactions).get(&id).cloned())
    }

    async fn mark_paid(&self, id: TransactionId) -> Result<PaymentOutcome, StoreError> {
        let mut transactions = write(&self.state.transactions);
        let tx = transactions.get_mut(&id).ok_or(StoreError::NotFound)?;
        Ok(tx.mark_paid(Utc::now()))
    }
}

/// Unit of work over the in-memory report row.
struct InMemoryReportWork {
    state: Arc<State>,
    row_lock: Option<OwnedMutexGuard<()>>,
    staged: Option<AggregateReport>,
}

impl InMemoryReportWork {
    fn ensure_locked(&self) -> Result<(), StoreError> {
        if self.row_lock.is_none() {
            return Err(StoreError::NotLocked);
        }
        Ok(())
    }
}

#[async_trait]
impl ReportUnitOfWork for InMemoryReportWork {
    async fn lock_report(&mut self) -> Result<AggregateReport, StoreError> {
        if self.row_lock.is_none() {
            self.row_lock = Some(self.state.report_lock.clone().lock_owned().await);
        }
        Ok(read(&self.state.report).clone())
    }

    async fn paid_totals(&mut self) -> Result<ReportTotals, StoreError> {
        self.ensure_locked()?;
        let transactions = read(&self.state.transactions);
        Ok(ReportTotals::from_transactions(transactions.values()))
    }

    async fn write_report(&mut self, report: &AggregateReport) -> Result<(), StoreError> {
        self.ensure_locked()?;
        self.staged = Some(report.clone());
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        self.ensure_locked()?;
        if let Some(report) = self.staged.take() {
            *write(&self.state.report) = report;
        }
        self.row_lock = None;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        self.staged = None;
        self.row_lock = None;
        Ok(())
    }
}

#[async_trait]
impl ReportStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn ReportUnitOfWork>, StoreError> {
        Ok(Box::new(InMemoryReportWork {
            state: self.state.clone(),
            row_lock: None,
            staged: None,
        }))
    }

    async fn load_report(&self) -> Result<AggregateReport, StoreError> {
        Ok(read(&self.state.report).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::ProductCategory;
    use storefront_products::CreateProduct;
    use storefront_sales::{CreateTransaction, TransactionItem};
    use storefront_users::CreateUser;

    fn product(with_image: bool) -> Product {
        Product::create(
            CreateProduct {
                name: "Mug".into(),
                price: 25,
                stock: 3,
                with_image,
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn user(email: &str) -> User {
        User::create(
            CreateUser {
                name: "Rin".into(),
                email: email.into(),
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn product_image_moves_forward_only() {
        let store = InMemoryStore::new();
        let p = product(true);
        store.insert_product(&p).await.unwrap();

        store
            .advance_product_image(p.id, ImageStatus::Cloud, Some("https://cdn/p.png"))
            .await
            .unwrap();
        let err = store
            .advance_product_image(p.id, ImageStatus::Failed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition(_)));

        let stored = store.get_product(p.id).await.unwrap().unwrap();
        assert_eq!(stored.image_status, ImageStatus::Cloud);
        assert_eq!(stored.image_url.as_deref(), Some("https://cdn/p.png"));
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let store = InMemoryStore::new();
        let err = store
            .advance_product_image(ProductId::new(), ImageStatus::Cloud, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let store = InMemoryStore::new();
        store.insert_user(&user("a@b.co")).await.unwrap();
        let err = store.insert_user(&user("A@b.co")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn save_profile_rejects_stale_status() {
        let store = InMemoryStore::new();
        let mut u = user("c@d.co");
        store.insert_user(&u).await.unwrap();

        u.begin_upload().unwrap();
        store.save_profile(&u, ImageStatus::Default).await.unwrap();

        // A second edit that still believes the status is `default`.
        let err = store.save_profile(&u, ImageStatus::Default).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn transaction_requires_existing_user() {
        let store = InMemoryStore::new();
        let tx = Transaction::create(
            CreateTransaction {
                user_id: UserId::new(),
                items: vec![TransactionItem {
                    product_id: ProductId::new(),
                    product_name: "Plan".into(),
                    category: ProductCategory::Subscription,
                    qty: 1,
                    price: 10,
                }],
                note: String::new(),
            },
            Utc::now(),
        )
        .unwrap();
        let err = store.insert_transaction(&tx).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingReference(_)));
    }

    #[tokio::test]
    async fn mark_paid_reports_outcome() {
        let store = InMemoryStore::new();
        let u = user("e@f.co");
        store.insert_user(&u).await.unwrap();
        let tx = Transaction::create(
            CreateTransaction {
                user_id: u.id,
                items: vec![TransactionItem {
                    product_id: ProductId::new(),
                    product_name: "Cable".into(),
                    category: ProductCategory::Goods,
                    qty: 2,
                    price: 5,
                }],
                note: "gift".into(),
            },
            Utc::now(),
        )
        .unwrap();
        store.insert_transaction(&tx).await.unwrap();

        assert_eq!(store.mark_paid(tx.id).await.unwrap(), PaymentOutcome::Paid);
        assert_eq!(store.mark_paid(tx.id).await.unwrap(), PaymentOutcome::AlreadyPaid);
        assert!(matches!(
            store.mark_paid(TransactionId::new()).await.unwrap_err(),
            StoreError::NotFound
        ));
    }

    #[tokio::test]
    async fn report_row_lock_is_exclusive() {
        let store = InMemoryStore::new();
        let mut first = store.begin().await.unwrap();
        first.lock_report().await.unwrap();

        let second_store = store.clone();
        let second = tokio::spawn(async move {
            let mut work = second_store.begin().await.unwrap();
            work.lock_report().await.unwrap();
            work.rollback().await.unwrap();
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!second.is_finished());

        first.rollback().await.unwrap();
        second.await.unwrap();
    }

    #[tokio::test]
    async fn uncommitted_write_is_discarded() {
        let store = InMemoryStore::new();
        let mut work = store.begin().await.unwrap();
        let mut report = work.lock_report().await.unwrap();
        report.totals.total_revenue = 999;
        work.write_report(&report).await.unwrap();
        drop(work);

        assert_eq!(store.load_report().await.unwrap(), AggregateReport::empty());
    }

    #[tokio::test]
    async fn writes_without_lock_are_refused() {
        let store = InMemoryStore::new();
        let mut work = store.begin().await.unwrap();
        let err = work.write_report(&AggregateReport::empty()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotLocked));
    }
}
