//! Integration tests for the background-job pipeline.
//!
//! Tests: request-side registration → upload / report jobs → stores
//!
//! Verifies:
//! - Waiting for the drain observes every side effect of registered jobs
//! - Uploads and report refreshes share one tracker
//! - Avatar replacement is refused while a previous upload is in flight

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::Bytes;
    use chrono::Utc;

    use storefront_core::{ImageStatus, ProductCategory, Uploadable, upload_key};
    use storefront_products::{CreateProduct, PRODUCT_IMAGE_PREFIX, Product};
    use storefront_sales::{CreateTransaction, PaymentOutcome, Transaction, TransactionItem};
    use storefront_users::{AVATAR_PREFIX, CreateUser, UpdateProfile, User};

    use crate::jobs::{JobKind, JobTracker};
    use crate::persistence::{
        InMemoryStore, ProductRepository, ReportStore, TransactionRepository, UserRepository,
    };
    use crate::report::ReportUpdater;
    use crate::storage::{LocalStagingStore, ObjectStoreBackend};
    use crate::upload::{UploadPipeline, UploadRequest, spawn_avatar_upload, spawn_product_image_upload};

    struct Harness {
        store: InMemoryStore,
        tracker: JobTracker,
        pipeline: UploadPipeline,
        updater: ReportUpdater,
        remote: Arc<ObjectStoreBackend>,
        _staging_dir: tempfile::TempDir,
    }

    fn setup() -> Harness {
        let staging_dir = tempfile::tempdir().unwrap();
        let store = InMemoryStore::new();
        let remote = Arc::new(ObjectStoreBackend::in_memory("https://cdn.test"));
        let pipeline = UploadPipeline::new(
            Arc::new(LocalStagingStore::new(staging_dir.path()).unwrap()),
            remote.clone(),
        );
        Harness {
            updater: ReportUpdater::new(Arc::new(store.clone())),
            store,
            tracker: JobTracker::new(),
            pipeline,
            remote,
            _staging_dir: staging_dir,
        }
    }

    async fn create_product_with_image(h: &Harness, name: &str) -> Product {
        let product = Product::create(
            CreateProduct {
                name: name.into(),
                price: 100,
                stock: 5,
                with_image: true,
            },
            Utc::now(),
        )
        .unwrap();
        h.store.insert_product(&product).await.unwrap();
        spawn_product_image_upload(
            &h.tracker,
            h.pipeline.clone(),
            Arc::new(h.store.clone()),
            product.id,
            UploadRequest::new(
                upload_key(PRODUCT_IMAGE_PREFIX, &format!("{name}.png")),
                Bytes::from(format!("image of {name}")),
            ),
        );
        product
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn drain_observes_every_upload() {
        let h = setup();
        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(create_product_with_image(&h, &format!("item-{i}")).await.id);
        }

        h.tracker.wait_drained().await;

        for id in ids {
            let product = h.store.get_product(id).await.unwrap().unwrap();
            assert_eq!(product.image_status, ImageStatus::Cloud);
            let url = product.image_url.expect("url recorded");
            let key = url.strip_prefix("https://cdn.test/").unwrap();
            assert!(key.starts_with("products/"));
            assert!(h.remote.get(key).await.is_ok());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn payments_and_uploads_share_one_drain() {
        let h = setup();
        let mut buyer = User::create(
            CreateUser {
                name: "Dewi".into(),
                email: "dewi@example.com".into(),
            },
            Utc::now(),
        )
        .unwrap();
        h.store.insert_user(&buyer).await.unwrap();

        let product = create_product_with_image(&h, "kettle").await;

        // Avatar upload runs alongside the payment refreshes.
        buyer
            .update_profile(
                UpdateProfile {
                    name: "Dewi S".into(),
                    with_avatar: true,
                },
                Utc::now(),
            )
            .unwrap();
        h.store.save_profile(&buyer, ImageStatus::Default).await.unwrap();
        spawn_avatar_upload(
            h.tracker.register(JobKind::Upload, buyer.id.to_string()),
            h.pipeline.clone(),
            Arc::new(h.store.clone()),
            buyer.id,
            UploadRequest::new(upload_key(AVATAR_PREFIX, "me.jpg"), Bytes::from_static(b"me")),
        );

        for (category, qty) in [(ProductCategory::Goods, 2), (ProductCategory::Service, 1)] {
            let tx = Transaction::create(
                CreateTransaction {
                    user_id: buyer.id,
                    items: vec![TransactionItem {
                        product_id: product.id,
                        product_name: product.name.clone(),
                        category,
                        qty,
                        price: 50,
                    }],
                    note: String::new(),
                },
                Utc::now(),
            )
            .unwrap();
            h.store.insert_transaction(&tx).await.unwrap();
            if h.store.mark_paid(tx.id).await.unwrap() == PaymentOutcome::Paid {
                h.updater.spawn_refresh(&h.tracker, tx.id);
            }
        }

        tokio::time::timeout(Duration::from_secs(5), h.tracker.wait_drained())
            .await
            .expect("all jobs drain");

        let report = h.store.load_report().await.unwrap();
        assert_eq!(report.totals.total_revenue, 150);
        assert_eq!(report.totals.total_paid_transactions, 2);
        assert_eq!(report.totals.total_unique_customers, 1);

        let stored = h.store.get_user(buyer.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Dewi S");
        assert_eq!(stored.image_status(), ImageStatus::Cloud);
        assert_eq!(
            h.store.get_product(product.id).await.unwrap().unwrap().image_status,
            ImageStatus::Cloud
        );
    }

    #[tokio::test]
    async fn second_avatar_is_refused_while_first_is_in_flight() {
        let h = setup();
        let mut user = User::create(
            CreateUser {
                name: "Tono".into(),
                email: "tono@example.com".into(),
            },
            Utc::now(),
        )
        .unwrap();
        h.store.insert_user(&user).await.unwrap();

        let cmd = UpdateProfile {
            name: "Tono".into(),
            with_avatar: true,
        };
        user.update_profile(cmd.clone(), Utc::now()).unwrap();
        h.store.save_profile(&user, ImageStatus::Default).await.unwrap();

        // Nothing has been spawned yet, so the stored status is still `uploading`.
        let mut again = h.store.get_user(user.id).await.unwrap().unwrap();
        assert!(again.update_profile(cmd, Utc::now()).is_err());
    }
}
