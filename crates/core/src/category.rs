//! Product categories used by transaction line items and report breakdowns.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Category of a sold item. Persisted as a small integer (`1..=3`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ProductCategory {
    Goods = 1,
    Service = 2,
    Subscription = 3,
}

impl ProductCategory {
    /// Name used as the key of report category summaries.
    pub fn name(&self) -> &'static str {
        match self {
            ProductCategory::Goods => "Goods",
            ProductCategory::Service => "Service",
            ProductCategory::Subscription => "Subscription",
        }
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl TryFrom<u8> for ProductCategory {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ProductCategory::Goods),
            2 => Ok(ProductCategory::Service),
            3 => Ok(ProductCategory::Subscription),
            other => Err(DomainError::validation(format!(
                "category must be between 1 and 3, got {other}"
            ))),
        }
    }
}

impl From<ProductCategory> for u8 {
    fn from(value: ProductCategory) -> Self {
        value.code()
    }
}

impl core::fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
