use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult, Entity, ImageStatus, ProductId, Uploadable};

/// Object-key prefix for product images.
pub const PRODUCT_IMAGE_PREFIX: &str = "products";

/// Command: CreateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub name: String,
    /// Price in the smallest currency unit.
    pub price: u32,
    pub stock: u32,
    /// An image accompanies the request and will be uploaded in the background.
    pub with_image: bool,
}

/// Catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: u32,
    pub stock: u32,
    pub image_url: Option<String>,
    pub image_status: ImageStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Validate and build a new product.
    ///
    /// With an image the product starts at `uploading`, otherwise at `default`.
    pub fn create(cmd: CreateProduct, now: DateTime<Utc>) -> DomainResult<Self> {
        let name = cmd.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("product name must not be empty"));
        }
        if name.chars().count() > 255 {
            return Err(DomainError::validation(
                "product name must be at most 255 characters",
            ));
        }

        let mut product = Self {
            id: ProductId::new(),
            name: name.to_string(),
            price: cmd.price,
            stock: cmd.stock,
            image_url: None,
            image_status: ImageStatus::Default,
            created_at: now,
            updated_at: now,
        };

        if cmd.with_image {
            product.begin_upload()?;
        }

        Ok(product)
    }
}

impl Entity for Product {
    const KIND: &'static str = "product";
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Uploadable for Product {
    fn image_status(&self) -> ImageStatus {
        self.image_status
    }

    fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    fn store_image(&mut self, status: ImageStatus, url: Option<String>) {
        self.image_status = status;
        self.image_url = url;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(name: &str, with_image: bool) -> DomainResult<Product> {
        Product::create(
            CreateProduct {
                name: name.to_string(),
                price: 1500,
                stock: 3,
                with_image,
            },
            Utc::now(),
        )
    }

    #[test]
    fn create_without_image_stays_default() {
        let p = create("Kopi Susu", false).unwrap();
        assert_eq!(p.image_status, ImageStatus::Default);
        assert!(p.image_url.is_none());
    }

    #[test]
    fn create_with_image_starts_uploading() {
        let p = create("Kopi Susu", true).unwrap();
        assert_eq!(p.image_status, ImageStatus::Uploading);
    }

    #[test]
    fn blank_name_is_rejected() {
        assert!(matches!(create("   ", false), Err(DomainError::Validation(_))));
    }

    #[test]
    fn single_stage_path_skips_local() {
        let mut p = create("Teh", true).unwrap();
        p.advance_image(ImageStatus::Cloud, Some("/public/uploads/products/a.png".into()))
            .unwrap();
        assert_eq!(p.image_status, ImageStatus::Cloud);
        assert_eq!(p.image_url.as_deref(), Some("/public/uploads/products/a.png"));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            #[test]
            fn valid_names_are_trimmed_and_kept(name in "[A-Za-z][A-Za-z0-9 ]{0,60}") {
                let padded = format!("  {name}  ");
                let p = create(&padded, false).unwrap();
                prop_assert_eq!(p.name, name.trim());
            }
        }
    }
}
