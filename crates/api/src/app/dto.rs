use serde::{Deserialize, Serialize};

use storefront_core::{ProductCategory, ProductId, UserId};
use storefront_sales::{CreateTransaction, Transaction, TransactionItem};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct TransactionItemRequest {
    pub product_id: String,
    pub product_name: String,
    pub category: u8,
    pub qty: u16,
    pub price: u32,
}

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub user_id: String,
    pub items: Vec<TransactionItemRequest>,
    #[serde(default)]
    pub note: String,
}

impl CreateTransactionRequest {
    pub fn into_command(self) -> Result<CreateTransaction, axum::response::Response> {
        let user_id: UserId = errors::parse_id(&self.user_id, "user")?;
        let mut items = Vec::with_capacity(self.items.len());
        for item in self.items {
            let product_id: ProductId = errors::parse_id(&item.product_id, "product")?;
            let category = ProductCategory::try_from(item.category)
                .map_err(errors::domain_error_to_response)?;
            items.push(TransactionItem {
                product_id,
                product_name: item.product_name,
                category,
                qty: item.qty,
                price: item.price,
            });
        }
        Ok(CreateTransaction {
            user_id,
            items,
            note: self.note,
        })
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub transaction: Transaction,
    /// The transaction was already paid before this request.
    pub already_paid: bool,
}
