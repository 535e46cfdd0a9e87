use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use storefront_core::{
    DomainError, DomainResult, Entity, ProductCategory, ProductId, TransactionId, UserId,
};

/// Requested line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub category: ProductCategory,
    pub qty: u16,
    /// Unit price in the smallest currency unit.
    pub price: u32,
}

/// Command: CreateTransaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTransaction {
    pub user_id: UserId,
    pub items: Vec<TransactionItem>,
    pub note: String,
}

/// Persisted line item of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDetail {
    pub product_id: ProductId,
    pub product_name: String,
    pub category: ProductCategory,
    pub qty: u16,
    pub price: u32,
}

impl TransactionDetail {
    pub fn subtotal(&self) -> u64 {
        u64::from(self.qty) * u64::from(self.price)
    }
}

/// Result of `Transaction::mark_paid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// The transaction moved `unpaid → paid` just now.
    Paid,
    /// It was already paid; nothing changed.
    AlreadyPaid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: UserId,
    pub invoice_code: String,
    pub total: u64,
    pub is_paid: bool,
    pub note: String,
    pub details: Vec<TransactionDetail>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Validate the request, compute the grand total and build the invoice.
    pub fn create(cmd: CreateTransaction, now: DateTime<Utc>) -> DomainResult<Self> {
        if cmd.items.is_empty() {
            return Err(DomainError::validation(
                "a transaction needs at least one item",
            ));
        }

        let mut details = Vec::with_capacity(cmd.items.len());
        for item in cmd.items {
            let product_name = item.product_name.trim().to_string();
            if product_name.is_empty() {
                return Err(DomainError::validation("product_name must not be empty"));
            }
            if item.qty == 0 {
                return Err(DomainError::validation("qty must be at least 1"));
            }
            details.push(TransactionDetail {
                product_id: item.product_id,
                product_name,
                category: item.category,
                qty: item.qty,
                price: item.price,
            });
        }

        let total = details.iter().map(TransactionDetail::subtotal).sum();
        let invoice_code = generate_invoice_code(now);
        let names = details
            .iter()
            .map(|d| d.product_name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let note = format!(
            "INV {invoice_code} includes: {names}. Additional notes: {}",
            cmd.note
        );

        Ok(Self {
            id: TransactionId::new(),
            user_id: cmd.user_id,
            invoice_code,
            total,
            is_paid: false,
            note,
            details,
            created_at: now,
            updated_at: now,
        })
    }

    /// `false → true` exactly once; paying twice is a no-op.
    pub fn mark_paid(&mut self, now: DateTime<Utc>) -> PaymentOutcome {
        if self.is_paid {
            return PaymentOutcome::AlreadyPaid;
        }
        self.is_paid = true;
        self.updated_at = now;
        PaymentOutcome::Paid
    }

    pub fn products_sold(&self) -> u64 {
        self.details.iter().map(|d| u64::from(d.qty)).sum()
    }
}

impl Entity for Transaction {
    const KIND: &'static str = "transaction";
    type Id = TransactionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// `INV-<year>-<4 digits>`; the digits come from the random tail of a UUIDv7.
fn generate_invoice_code(now: DateTime<Utc>) -> String {
    let suffix = Uuid::now_v7().as_u128() % 10_000;
    format!("INV-{}-{:04}", now.year(), suffix)
}
