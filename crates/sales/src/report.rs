//! Aggregate transaction report.
//!
//! The report is a single logical row of totals derived from the set of paid
//! transactions. It is always recomputed wholesale from a snapshot and written
//! as a full replacement, never patched field by field.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::transaction::Transaction;

/// Primary key of the single report row.
pub const REPORT_ID: i16 = 1;

/// Products sold per category name.
pub type CategorySummary = BTreeMap<String, u64>;

/// Totals over the paid transactions at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportTotals {
    pub total_revenue: u64,
    pub total_paid_transactions: u64,
    pub total_products_sold: u64,
    pub total_unique_customers: u64,
    pub category_summary: CategorySummary,
}

impl ReportTotals {
    /// Aggregate over `transactions`, ignoring the unpaid ones.
    pub fn from_transactions<'a, I>(transactions: I) -> Self
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        let mut totals = Self::default();
        let mut customers = HashSet::new();

        for tx in transactions.into_iter().filter(|t| t.is_paid) {
            totals.total_revenue += tx.total;
            totals.total_paid_transactions += 1;
            customers.insert(tx.user_id);

            for d in &tx.details {
                let qty = u64::from(d.qty);
                totals.total_products_sold += qty;
                *totals
                    .category_summary
                    .entry(d.category.name().to_string())
                    .or_default() += qty;
            }
        }

        totals.total_unique_customers = customers.len() as u64;
        totals
    }
}

/// The persisted report row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub id: i16,
    #[serde(flatten)]
    pub totals: ReportTotals,
    /// `None` until the first refresh.
    pub updated_at: Option<DateTime<Utc>>,
}

impl AggregateReport {
    /// The zeroed row that exists before any refresh.
    pub fn empty() -> Self {
        Self {
            id: REPORT_ID,
            totals: ReportTotals::default(),
            updated_at: None,
        }
    }

    /// Overwrite every field with freshly computed totals.
    pub fn replace(&mut self, totals: ReportTotals, now: DateTime<Utc>) {
        self.totals = totals;
        self.updated_at = Some(now);
    }
}

impl Default for AggregateReport {
    fn default() -> Self {
        Self::empty()
    }
}
