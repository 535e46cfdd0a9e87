//! Image status vocabulary shared by every uploadable entity.
//!
//! Statuses are persisted as plain strings. Two flows exist:
//!
//! - single-stage: `default → uploading → cloud | failed`
//! - two-stage:    `default → uploading → local → cloud | failed`
//!
//! `done` is accepted as an alias of `cloud` when parsing.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStatus {
    #[default]
    Default,
    Uploading,
    Local,
    #[serde(alias = "done")]
    Cloud,
    Failed,
}

impl ImageStatus {
    pub const ALL: [ImageStatus; 5] = [
        ImageStatus::Default,
        ImageStatus::Uploading,
        ImageStatus::Local,
        ImageStatus::Cloud,
        ImageStatus::Failed,
    ];

    /// Statuses from which a fresh upload cycle may start.
    pub const UPLOAD_START: [ImageStatus; 3] =
        [ImageStatus::Default, ImageStatus::Cloud, ImageStatus::Failed];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageStatus::Default => "default",
            ImageStatus::Uploading => "uploading",
            ImageStatus::Local => "local",
            ImageStatus::Cloud => "cloud",
            ImageStatus::Failed => "failed",
        }
    }

    /// Position along the upload path. Transitions strictly increase it.
    pub fn rank(&self) -> u8 {
        match self {
            ImageStatus::Default => 0,
            ImageStatus::Uploading => 1,
            ImageStatus::Local => 2,
            ImageStatus::Cloud | ImageStatus::Failed => 3,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ImageStatus::Cloud | ImageStatus::Failed)
    }

    /// An upload job currently owns the status.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, ImageStatus::Uploading | ImageStatus::Local)
    }

    pub fn can_transition_to(&self, next: ImageStatus) -> bool {
        use ImageStatus::*;
        matches!(
            (self, next),
            (Default, Uploading)
                | (Uploading, Local)
                | (Uploading, Cloud)
                | (Uploading, Failed)
                | (Local, Cloud)
                | (Local, Failed)
        )
    }

    /// Every status that may legally move to `next` within one upload cycle.
    pub fn transition_sources(next: ImageStatus) -> Vec<ImageStatus> {
        Self::ALL
            .into_iter()
            .filter(|s| s.can_transition_to(next))
            .collect()
    }
}

impl core::fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(ImageStatus::Default),
            "uploading" => Ok(ImageStatus::Uploading),
            "local" => Ok(ImageStatus::Local),
            "cloud" | "done" => Ok(ImageStatus::Cloud),
            "failed" => Ok(ImageStatus::Failed),
            other => Err(DomainError::validation(format!(
                "unknown image status: {other}"
            ))),
        }
    }
}

/// An entity that owns an image moved through the upload pipeline.
///
/// Implementors only expose raw accessors; the transition rules live in the
/// provided methods so every entity type enforces the same invariant.
pub trait Uploadable {
    fn image_status(&self) -> ImageStatus;

    fn image_url(&self) -> Option<&str>;

    /// Raw setter. Callers go through `begin_upload` / `advance_image`.
    fn store_image(&mut self, status: ImageStatus, url: Option<String>);

    /// Start a new upload cycle for a replacement image.
    fn begin_upload(&mut self) -> DomainResult<()> {
        let current = self.image_status();
        if current.is_in_flight() {
            return Err(DomainError::conflict(format!(
                "an upload is already in progress (status: {current})"
            )));
        }
        let url = self.image_url().map(str::to_owned);
        self.store_image(ImageStatus::Uploading, url);
        Ok(())
    }

    /// Close an in-flight cycle that no job is driving any more, marking it
    /// `failed` so [`begin_upload`](Self::begin_upload) can start a new one.
    /// Settled statuses are left alone.
    fn abandon_upload(&mut self) -> DomainResult<()> {
        if !self.image_status().is_in_flight() {
            return Ok(());
        }
        self.advance_image(ImageStatus::Failed, None)
    }

    /// Move forward along the current cycle. `url: None` keeps the stored URL.
    fn advance_image(&mut self, next: ImageStatus, url: Option<String>) -> DomainResult<()> {
        let current = self.image_status();
        if !current.can_transition_to(next) {
            return Err(DomainError::invariant(format!(
                "image status cannot move from {current} to {next}"
            )));
        }
        let url = url.or_else(|| self.image_url().map(str::to_owned));
        self.store_image(next, url);
        Ok(())
    }
}

/// Derive a fresh object key for an uploaded file: `<prefix>/<uuid><.ext>`.
///
/// Only a short alphanumeric extension survives from the client filename.
pub fn upload_key(prefix: &str, original_filename: &str) -> String {
    let ext = std::path::Path::new(original_filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 10 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();
    format!("{}/{}{}", prefix.trim_end_matches('/'), uuid::Uuid::now_v7(), ext)
}
