//! Service wiring: stores, job tracker, upload pipeline and report updater,
//! plus the use-case methods the route handlers call.
//!
//! Every method persists its synchronous part and returns. Detached work
//! (uploads, report refreshes) is registered with the shared [`JobTracker`]
//! before it is spawned, so a drain started after a handler responds always
//! covers it.

use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use chrono::Utc;
use tracing::info;

use storefront_core::{DomainError, ImageStatus, ProductId, TransactionId, UserId, upload_key};
use storefront_infra::config::{AppConfig, StorageKind};
use storefront_infra::jobs::JobTracker;
use storefront_infra::persistence::{
    InMemoryStore, PostgresStore, ProductRepository, ReportStore, StoreError,
    TransactionRepository, UserRepository,
};
use storefront_infra::report::ReportUpdater;
use storefront_infra::storage::{LocalStagingStore, ObjectStoreBackend, StorageBackend};
use storefront_infra::upload::{
    UploadPipeline, UploadRequest, reserve_avatar_upload, spawn_avatar_upload,
    spawn_product_image_upload,
};
use storefront_products::{CreateProduct, PRODUCT_IMAGE_PREFIX, Product};
use storefront_sales::{AggregateReport, CreateTransaction, PaymentOutcome, Transaction};
use storefront_users::{AVATAR_PREFIX, CreateUser, UpdateProfile, User};

/// A file received with a request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Bytes,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Persistence handles, one per port.
#[derive(Clone)]
pub struct Stores {
    pub products: Arc<dyn ProductRepository>,
    pub users: Arc<dyn UserRepository>,
    pub transactions: Arc<dyn TransactionRepository>,
    pub reports: Arc<dyn ReportStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        let store = InMemoryStore::new();
        Self {
            products: Arc::new(store.clone()),
            users: Arc::new(store.clone()),
            transactions: Arc::new(store.clone()),
            reports: Arc::new(store),
        }
    }

    pub fn postgres(store: PostgresStore) -> Self {
        Self {
            products: Arc::new(store.clone()),
            users: Arc::new(store.clone()),
            transactions: Arc::new(store.clone()),
            reports: Arc::new(store),
        }
    }
}

pub struct AppServices {
    stores: Stores,
    tracker: JobTracker,
    pipeline: UploadPipeline,
    report_updater: ReportUpdater,
}

impl AppServices {
    pub fn new(stores: Stores, pipeline: UploadPipeline, tracker: JobTracker) -> Self {
        let report_updater = ReportUpdater::new(stores.reports.clone());
        Self {
            stores,
            tracker,
            pipeline,
            report_updater,
        }
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    pub async fn create_product(
        &self,
        cmd: CreateProduct,
        image: Option<UploadedFile>,
    ) -> Result<Product, ServiceError> {
        let product = Product::create(
            CreateProduct {
                with_image: image.is_some(),
                ..cmd
            },
            Utc::now(),
        )?;
        self.stores.products.insert_product(&product).await?;

        if let Some(file) = image {
            let key = upload_key(PRODUCT_IMAGE_PREFIX, &file.filename);
            spawn_product_image_upload(
                &self.tracker,
                self.pipeline.clone(),
                self.stores.products.clone(),
                product.id,
                UploadRequest::new(key, file.bytes),
            );
        }

        info!(product_id = %product.id, status = %product.image_status, "product created");
        Ok(product)
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Product, ServiceError> {
        self.stores
            .products
            .get_product(id)
            .await?
            .ok_or(ServiceError::Domain(DomainError::missing::<Product>()))
    }

    pub async fn create_user(&self, cmd: CreateUser) -> Result<User, ServiceError> {
        let user = User::create(cmd, Utc::now())?;
        self.stores.users.insert_user(&user).await?;
        info!(user_id = %user.id, "user created");
        Ok(user)
    }

    pub async fn get_user(&self, id: UserId) -> Result<User, ServiceError> {
        self.stores
            .users
            .get_user(id)
            .await?
            .ok_or(ServiceError::Domain(DomainError::missing::<User>()))
    }

    /// Rename the user and, with an avatar, start its two-stage upload.
    ///
    /// The upload is registered before the new status is saved, so a
    /// concurrent edit sees it running. An avatar stuck at `uploading` or
    /// `local` with no running job is replaced rather than refused.
    pub async fn update_profile(
        &self,
        id: UserId,
        name: String,
        avatar: Option<UploadedFile>,
    ) -> Result<User, ServiceError> {
        let mut user = self.get_user(id).await?;
        let previous: ImageStatus = user.image_status;
        let reservation = match avatar {
            Some(_) => Some(reserve_avatar_upload(&self.tracker, &mut user)?),
            None => None,
        };
        user.update_profile(
            UpdateProfile {
                name,
                with_avatar: avatar.is_some(),
            },
            Utc::now(),
        )?;
        self.stores.users.save_profile(&user, previous).await?;

        if let (Some(file), Some(reservation)) = (avatar, reservation) {
            let key = upload_key(AVATAR_PREFIX, &file.filename);
            spawn_avatar_upload(
                reservation,
                self.pipeline.clone(),
                self.stores.users.clone(),
                user.id,
                UploadRequest::new(key, file.bytes),
            );
        }

        Ok(user)
    }

    pub async fn create_transaction(
        &self,
        cmd: CreateTransaction,
    ) -> Result<Transaction, ServiceError> {
        let tx = Transaction::create(cmd, Utc::now())?;
        self.stores.transactions.insert_transaction(&tx).await?;
        info!(transaction_id = %tx.id, invoice = %tx.invoice_code, total = tx.total, "transaction created");
        Ok(tx)
    }

    pub async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, ServiceError> {
        self.stores
            .transactions
            .get_transaction(id)
            .await?
            .ok_or(ServiceError::Domain(DomainError::missing::<Transaction>()))
    }

    /// Mark a transaction paid. Only the call that actually flips the flag
    /// schedules a report refresh.
    pub async fn mark_paid(
        &self,
        id: TransactionId,
    ) -> Result<(Transaction, PaymentOutcome), ServiceError> {
        let outcome = self.stores.transactions.mark_paid(id).await?;
        if outcome == PaymentOutcome::Paid {
            self.report_updater.spawn_refresh(&self.tracker, id);
        }
        let tx = self.get_transaction(id).await?;
        Ok((tx, outcome))
    }

    pub async fn report(&self) -> Result<AggregateReport, ServiceError> {
        Ok(self.stores.reports.load_report().await?)
    }
}

/// Build the services described by `cfg`.
///
/// Without a `database_url` everything lives in memory.
pub async fn build_services(cfg: &AppConfig, tracker: JobTracker) -> anyhow::Result<AppServices> {
    let stores = match cfg.database_url.as_deref() {
        Some(url) => {
            let store = PostgresStore::connect(url)
                .await
                .context("failed to connect to postgres")?;
            store
                .ensure_schema()
                .await
                .context("failed to apply schema")?;
            Stores::postgres(store)
        }
        None => {
            info!("no database_url configured; using in-memory persistence");
            Stores::in_memory()
        }
    };

    let staging = LocalStagingStore::new(&cfg.staging_dir)
        .with_context(|| format!("failed to prepare staging dir {}", cfg.staging_dir.display()))?;
    let storage: Arc<dyn StorageBackend> = match cfg.storage.kind {
        StorageKind::Local => Arc::new(
            ObjectStoreBackend::local(&cfg.storage.local_dir, cfg.storage.public_base_url.clone())
                .with_context(|| {
                    format!("failed to open storage dir {}", cfg.storage.local_dir.display())
                })?,
        ),
        StorageKind::Memory => Arc::new(ObjectStoreBackend::in_memory(
            cfg.storage.public_base_url.clone(),
        )),
    };

    let pipeline = UploadPipeline::new(Arc::new(staging), storage);
    Ok(AppServices::new(stores, pipeline, tracker))
}
