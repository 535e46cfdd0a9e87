//! Status hooks for the two uploadable entities and the job entry points that
//! drive them.
//!
//! Products use the single-stage flow: the staged state is not persisted and
//! a remote failure marks the product `failed`. Users use the two-stage flow:
//! `local` is written once the avatar is staged. A remote failure leaves the
//! user at `local` with the staged file in place; nothing retries it, but
//! the next avatar edit abandons the stalled cycle and starts over.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use storefront_core::{DomainResult, ImageStatus, ProductId, Uploadable, UserId};
use storefront_users::User;

use crate::jobs::{JobGuard, JobKind, JobTracker};
use crate::persistence::{ProductRepository, UserRepository};

use super::pipeline::{UploadError, UploadHooks, UploadPipeline, UploadRequest};

/// Writes a product's image status as its upload progresses.
pub struct ProductImageHooks {
    products: Arc<dyn ProductRepository>,
    product_id: ProductId,
}

impl ProductImageHooks {
    pub fn new(products: Arc<dyn ProductRepository>, product_id: ProductId) -> Self {
        Self {
            products,
            product_id,
        }
    }

    async fn mark_failed(&self) {
        if let Err(e) = self
            .products
            .advance_product_image(self.product_id, ImageStatus::Failed, None)
            .await
        {
            error!(product_id = %self.product_id, error = %e, "failed to mark product image as failed");
        }
    }
}

#[async_trait]
impl UploadHooks for ProductImageHooks {
    async fn on_staged(&self) {}

    async fn on_remote_success(&self, url: &str) {
        if let Err(e) = self
            .products
            .advance_product_image(self.product_id, ImageStatus::Cloud, Some(url))
            .await
        {
            error!(product_id = %self.product_id, error = %e, "failed to record product image url");
        }
    }
}

/// Writes a user's avatar status as its upload progresses.
pub struct AvatarHooks {
    users: Arc<dyn UserRepository>,
    user_id: UserId,
}

impl AvatarHooks {
    pub fn new(users: Arc<dyn UserRepository>, user_id: UserId) -> Self {
        Self { users, user_id }
    }
}

#[async_trait]
impl UploadHooks for AvatarHooks {
    async fn on_staged(&self) {
        if let Err(e) = self
            .users
            .advance_user_image(self.user_id, ImageStatus::Local, None)
            .await
        {
            error!(user_id = %self.user_id, error = %e, "failed to record staged avatar");
        }
    }

    async fn on_remote_success(&self, url: &str) {
        if let Err(e) = self
            .users
            .advance_user_image(self.user_id, ImageStatus::Cloud, Some(url))
            .await
        {
            error!(user_id = %self.user_id, error = %e, "failed to record avatar url");
        }
    }
}

/// Register and start the image upload for a product already stored at
/// `uploading`.
pub fn spawn_product_image_upload(
    tracker: &JobTracker,
    pipeline: UploadPipeline,
    products: Arc<dyn ProductRepository>,
    product_id: ProductId,
    request: UploadRequest,
) -> JoinHandle<()> {
    let hooks = ProductImageHooks::new(products, product_id);
    tracker.spawn(JobKind::Upload, product_id.to_string(), move |job| async move {
        match pipeline.run(&job, request, &hooks).await {
            Ok(_) => {}
            Err(UploadError::Remote(_)) => hooks.mark_failed().await,
            Err(UploadError::Staging(_)) => {
                warn!(product_id = %product_id, "product image never staged; status left at uploading");
            }
        }
    })
}

/// Register an avatar upload for `user`, before its new status is saved.
///
/// A status left at `uploading` or `local` by a job that is no longer
/// running is abandoned (`failed`) first, so a stalled upload never blocks a
/// replacement. While a job for the user is still running the status is kept
/// and the caller's `begin_upload` reports the conflict.
pub fn reserve_avatar_upload(tracker: &JobTracker, user: &mut User) -> DomainResult<JobGuard> {
    let entity_id = user.id.to_string();
    if user.image_status.is_in_flight() && !tracker.is_running(JobKind::Upload, &entity_id) {
        warn!(
            user_id = %user.id,
            status = %user.image_status,
            "abandoning stalled avatar upload"
        );
        user.abandon_upload()?;
    }
    Ok(tracker.register(JobKind::Upload, entity_id))
}

/// Start the avatar upload reserved by `reservation` for a user already
/// stored at `uploading`.
pub fn spawn_avatar_upload(
    reservation: JobGuard,
    pipeline: UploadPipeline,
    users: Arc<dyn UserRepository>,
    user_id: UserId,
    request: UploadRequest,
) -> JoinHandle<()> {
    let hooks = AvatarHooks::new(users, user_id);
    reservation.spawn(move |job| async move {
        if let Err(e) = pipeline.run(&job, request, &hooks).await {
            warn!(user_id = %user_id, error = %e, "avatar upload did not reach remote storage");
        }
    })
}
