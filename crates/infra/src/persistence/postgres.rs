//! Postgres-backed stores.
//!
//! ## Error Mapping
//!
//! | PostgreSQL error code | `StoreError` |
//! |-----------------------|--------------|
//! | `23505` unique violation | `Conflict` |
//! | `23503` foreign key violation | `MissingReference` |
//! | anything else | `Database` |
//!
//! ## Report locking
//!
//! The report unit of work runs inside one database transaction and starts
//! with `SELECT ... FOR UPDATE` on the report row, so concurrent refreshes
//! serialize on that row. Totals are computed by a single statement issued
//! after the lock is held, which gives them one consistent snapshot.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction as DbTransaction};
use tracing::instrument;
use uuid::Uuid;

use storefront_core::{ImageStatus, ProductCategory, ProductId, TransactionId, UserId};
use storefront_products::Product;
use storefront_sales::{
    AggregateReport, CategorySummary, PaymentOutcome, REPORT_ID, ReportTotals, Transaction,
    TransactionDetail,
};
use storefront_users::User;

use super::{
    ProductRepository, ReportStore, ReportUnitOfWork, StoreError, TransactionRepository,
    UserRepository,
};

/// Schema applied by [`PostgresStore::ensure_schema`]. Idempotent.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id            UUID PRIMARY KEY,
    name          VARCHAR(255) NOT NULL,
    email         VARCHAR(255) NOT NULL UNIQUE,
    avatar_url    TEXT,
    image_status  VARCHAR(20) NOT NULL DEFAULT 'default',
    created_at    TIMESTAMPTZ NOT NULL,
    updated_at    TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS products (
    id            UUID PRIMARY KEY,
    name          VARCHAR(255) NOT NULL,
    price         BIGINT NOT NULL CHECK (price >= 0),
    stock         BIGINT NOT NULL CHECK (stock >= 0),
    image_url     TEXT,
    image_status  VARCHAR(20) NOT NULL DEFAULT 'default',
    created_at    TIMESTAMPTZ NOT NULL,
    updated_at    TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS transactions (
    id            UUID PRIMARY KEY,
    user_id       UUID NOT NULL REFERENCES users (id),
    invoice_code  VARCHAR(32) NOT NULL UNIQUE,
    total         BIGINT NOT NULL CHECK (total >= 0),
    is_paid       BOOLEAN NOT NULL DEFAULT FALSE,
    note          TEXT NOT NULL,
    created_at    TIMESTAMPTZ NOT NULL,
    updated_at    TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS transaction_details (
    transaction_id  UUID NOT NULL REFERENCES transactions (id) ON DELETE CASCADE,
    line_no         INTEGER NOT NULL,
    product_id      UUID NOT NULL,
    product_name    VARCHAR(255) NOT NULL,
    category        SMALLINT NOT NULL CHECK (category BETWEEN 1 AND 3),
    qty             INTEGER NOT NULL CHECK (qty > 0),
    price           BIGINT NOT NULL CHECK (price >= 0),
    PRIMARY KEY (transaction_id, line_no)
);

CREATE TABLE IF NOT EXISTS transaction_reports (
    id                       SMALLINT PRIMARY KEY,
    total_revenue            BIGINT NOT NULL DEFAULT 0,
    total_paid_transactions  BIGINT NOT NULL DEFAULT 0,
    total_products_sold      BIGINT NOT NULL DEFAULT 0,
    total_unique_customers   BIGINT NOT NULL DEFAULT 0,
    category_summary         JSONB NOT NULL DEFAULT '{}'::jsonb,
    updated_at               TIMESTAMPTZ
);

INSERT INTO transaction_reports (id) VALUES (1) ON CONFLICT (id) DO NOTHING;
"#;

/// Postgres implementation of every repository and the report store.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool for `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables if missing and seed the report row.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let msg = format!("{operation}: {}", db_err.message());
        match db_err.code().as_deref() {
            Some("23505") => return StoreError::Conflict(msg),
            Some("23503") => return StoreError::MissingReference(msg),
            _ => {}
        }
    }
    StoreError::Database(err)
}

fn to_i64(value: u64, field: &str) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Corrupt(format!("{field} out of range: {value}")))
}

fn to_u64(value: i64, field: &str) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Corrupt(format!("{field} is negative: {value}")))
}

fn to_u32(value: i64, field: &str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{field} out of range: {value}")))
}

fn parse_status(raw: &str) -> Result<ImageStatus, StoreError> {
    raw.parse()
        .map_err(|_| StoreError::Corrupt(format!("unknown image status {raw:?}")))
}

fn sources(next: ImageStatus) -> Vec<String> {
    ImageStatus::transition_sources(next)
        .into_iter()
        .map(|s| s.as_str().to_string())
        .collect()
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        price: to_u32(row.try_get("price")?, "price")?,
        stock: to_u32(row.try_get("stock")?, "stock")?,
        image_url: row.try_get("image_url")?,
        image_status: parse_status(row.try_get::<&str, _>("image_status")?)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    Ok(User {
        id: UserId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        avatar_url: row.try_get("avatar_url")?,
        image_status: parse_status(row.try_get::<&str, _>("image_status")?)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn report_from_row(row: &PgRow) -> Result<AggregateReport, StoreError> {
    let Json(category_summary): Json<CategorySummary> = row.try_get("category_summary")?;
    Ok(AggregateReport {
        id: row.try_get("id")?,
        totals: ReportTotals {
            total_revenue: to_u64(row.try_get("total_revenue")?, "total_revenue")?,
            total_paid_transactions: to_u64(
                row.try_get("total_paid_transactions")?,
                "total_paid_transactions",
            )?,
            total_products_sold: to_u64(row.try_get("total_products_sold")?, "total_products_sold")?,
            total_unique_customers: to_u64(
                row.try_get("total_unique_customers")?,
                "total_unique_customers",
            )?,
            category_summary,
        },
        updated_at: row.try_get::<Option<DateTime<Utc>>, _>("updated_at")?,
    })
}

/// Tell an unknown row apart from a status guard that did not match.
async fn guard_failure(
    pool: &PgPool,
    table: &'static str,
    id: Uuid,
    next: ImageStatus,
) -> StoreError {
    let query = format!("SELECT image_status FROM {table} WHERE id = $1");
    match sqlx::query_scalar::<_, String>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await
    {
        Ok(Some(current)) => {
            StoreError::InvalidTransition(format!("{table} {id}: {current} -> {next}"))
        }
        Ok(None) => StoreError::NotFound,
        Err(e) => map_sqlx_error("guard_failure", e),
    }
}

#[async_trait]
impl ProductRepository for PostgresStore {
    #[instrument(skip(self, product), fields(product_id = %product.id), err)]
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products
                (id, name, price, stock, image_url, image_status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(i64::from(product.price))
        .bind(i64::from(product.stock))
        .bind(&product.image_url)
        .bind(product.image_status.as_str())
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, price, stock, image_url, image_status, created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_product", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(skip(self, id, next, url), fields(product_id = %id, next = %next), err)]
    async fn advance_product_image(
        &self,
        id: ProductId,
        next: ImageStatus,
        url: Option<&str>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET image_status = $2,
                image_url = COALESCE($3, image_url),
                updated_at = NOW()
            WHERE id = $1 AND image_status = ANY($4)
            "#,
        )
        .bind(id.as_uuid())
        .bind(next.as_str())
        .bind(url)
        .bind(sources(next))
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("advance_product_image", e))?;

        if result.rows_affected() == 0 {
            return Err(guard_failure(&self.pool, "products", *id.as_uuid(), next).await);
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for PostgresStore {
    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users
                (id, name, email, avatar_url, image_status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.avatar_url)
        .bind(user.image_status.as_str())
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, email, avatar_url, image_status, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_user", e))?;

        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn save_profile(&self, user: &User, expected_status: ImageStatus) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET name = $2, image_status = $3, avatar_url = $4, updated_at = $5
            WHERE id = $1 AND image_status = $6
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.name)
        .bind(user.image_status.as_str())
        .bind(&user.avatar_url)
        .bind(user.updated_at)
        .bind(expected_status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("save_profile", e))?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query_scalar::<_, i32>("SELECT 1 FROM users WHERE id = $1")
                .bind(user.id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("save_profile", e))?;
            return Err(match exists {
                Some(_) => StoreError::Conflict(format!(
                    "avatar status of user {} changed while the profile was being edited",
                    user.id
                )),
                None => StoreError::NotFound,
            });
        }
        Ok(())
    }

    #[instrument(skip(self, id, next, url), fields(user_id = %id, next = %next), err)]
    async fn advance_user_image(
        &self,
        id: UserId,
        next: ImageStatus,
        url: Option<&str>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET image_status = $2,
                avatar_url = COALESCE($3, avatar_url),
                updated_at = NOW()
            WHERE id = $1 AND image_status = ANY($4)
            "#,
        )
        .bind(id.as_uuid())
        .bind(next.as_str())
        .bind(url)
        .bind(sources(next))
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("advance_user_image", e))?;

        if result.rows_affected() == 0 {
            return Err(guard_failure(&self.pool, "users", *id.as_uuid(), next).await);
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionRepository for PostgresStore {
    #[instrument(skip(self, tx), fields(transaction_id = %tx.id), err)]
    async fn insert_transaction(&self, tx: &Transaction) -> Result<(), StoreError> {
        let mut db = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("insert_transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO transactions
                (id, user_id, invoice_code, total, is_paid, note, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(tx.id.as_uuid())
        .bind(tx.user_id.as_uuid())
        .bind(&tx.invoice_code)
        .bind(to_i64(tx.total, "total")?)
        .bind(tx.is_paid)
        .bind(&tx.note)
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .execute(&mut *db)
        .await
        .map_err(|e| map_sqlx_error("insert_transaction", e))?;

        for (line_no, detail) in tx.details.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO transaction_details
                    (transaction_id, line_no, product_id, product_name, category, qty, price)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(tx.id.as_uuid())
            .bind(line_no as i32)
            .bind(detail.product_id.as_uuid())
            .bind(&detail.product_name)
            .bind(i16::from(detail.category.code()))
            .bind(i32::from(detail.qty))
            .bind(i64::from(detail.price))
            .execute(&mut *db)
            .await
            .map_err(|e| map_sqlx_error("insert_transaction_detail", e))?;
        }

        db.commit()
            .await
            .map_err(|e| map_sqlx_error("insert_transaction", e))?;
        Ok(())
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        let Some(row) = sqlx::query(
            r#"
            SELECT id, user_id, invoice_code, total, is_paid, note, created_at, updated_at
            FROM transactions
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_transaction", e))?
        else {
            return Ok(None);
        };

        let detail_rows = sqlx::query(
            r#"
            SELECT product_id, product_name, category, qty, price
            FROM transaction_details
            WHERE transaction_id = $1
            ORDER BY line_no ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_transaction_details", e))?;

        let mut details = Vec::with_capacity(detail_rows.len());
        for d in &detail_rows {
            let category: i16 = d.try_get("category")?;
            let qty: i32 = d.try_get("qty")?;
            details.push(TransactionDetail {
                product_id: ProductId::from_uuid(d.try_get("product_id")?),
                product_name: d.try_get("product_name")?,
                category: u8::try_from(category)
                    .ok()
                    .and_then(|c| ProductCategory::try_from(c).ok())
                    .ok_or_else(|| StoreError::Corrupt(format!("unknown category {category}")))?,
                qty: u16::try_from(qty)
                    .map_err(|_| StoreError::Corrupt(format!("qty out of range: {qty}")))?,
                price: to_u32(d.try_get("price")?, "price")?,
            });
        }

        Ok(Some(Transaction {
            id: TransactionId::from_uuid(row.try_get("id")?),
            user_id: UserId::from_uuid(row.try_get("user_id")?),
            invoice_code: row.try_get("invoice_code")?,
            total: to_u64(row.try_get("total")?, "total")?,
            is_paid: row.try_get("is_paid")?,
            note: row.try_get("note")?,
            details,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }

    #[instrument(skip(self, id), fields(transaction_id = %id), err)]
    async fn mark_paid(&self, id: TransactionId) -> Result<PaymentOutcome, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET is_paid = TRUE, updated_at = NOW()
            WHERE id = $1 AND NOT is_paid
            "#,
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("mark_paid", e))?;

        if result.rows_affected() == 1 {
            return Ok(PaymentOutcome::Paid);
        }

        let exists = sqlx::query_scalar::<_, i32>("SELECT 1 FROM transactions WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("mark_paid", e))?;
        match exists {
            Some(_) => Ok(PaymentOutcome::AlreadyPaid),
            None => Err(StoreError::NotFound),
        }
    }
}

/// Report unit of work over one database transaction.
struct PostgresReportWork {
    tx: Option<DbTransaction<'static, Postgres>>,
    locked: bool,
}

impl PostgresReportWork {
    fn open(&mut self) -> Result<&mut DbTransaction<'static, Postgres>, StoreError> {
        self.tx
            .as_mut()
            .ok_or_else(|| StoreError::Conflict("report unit of work already finished".into()))
    }

    fn locked(&mut self) -> Result<&mut DbTransaction<'static, Postgres>, StoreError> {
        if !self.locked {
            return Err(StoreError::NotLocked);
        }
        self.open()
    }
}

#[async_trait]
impl ReportUnitOfWork for PostgresReportWork {
    async fn lock_report(&mut self) -> Result<AggregateReport, StoreError> {
        let tx = self.open()?;
        let row = sqlx::query(
            r#"
            SELECT id, total_revenue, total_paid_transactions, total_products_sold,
                   total_unique_customers, category_summary, updated_at
            FROM transaction_reports
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(REPORT_ID)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lock_report", e))?
        .ok_or(StoreError::NotFound)?;

        self.locked = true;
        report_from_row(&row)
    }

    async fn paid_totals(&mut self) -> Result<ReportTotals, StoreError> {
        let tx = self.locked()?;
        let row = sqlx::query(
            r#"
            WITH paid AS (
                SELECT id, user_id, total FROM transactions WHERE is_paid
            ),
            lines AS (
                SELECT d.category, d.qty
                FROM transaction_details d
                JOIN paid p ON p.id = d.transaction_id
            )
            SELECT
                (SELECT COALESCE(SUM(total), 0)::BIGINT FROM paid)        AS revenue,
                (SELECT COUNT(*) FROM paid)                               AS paid_count,
                (SELECT COUNT(DISTINCT user_id) FROM paid)                AS customers,
                (SELECT COALESCE(SUM(qty), 0)::BIGINT FROM lines)         AS products_sold,
                (SELECT COALESCE(jsonb_object_agg(category, qty), '{}'::jsonb)
                   FROM (SELECT category, SUM(qty)::BIGINT AS qty
                           FROM lines GROUP BY category) c)               AS by_category
            "#,
        )
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("paid_totals", e))?;

        let Json(by_code): Json<BTreeMap<String, i64>> = row.try_get("by_category")?;
        let mut category_summary = CategorySummary::new();
        for (code, qty) in by_code {
            let category = code
                .parse::<u8>()
                .ok()
                .and_then(|c| ProductCategory::try_from(c).ok())
                .ok_or_else(|| StoreError::Corrupt(format!("unknown category {code}")))?;
            category_summary.insert(category.name().to_string(), to_u64(qty, "category qty")?);
        }

        Ok(ReportTotals {
            total_revenue: to_u64(row.try_get("revenue")?, "revenue")?,
            total_paid_transactions: to_u64(row.try_get("paid_count")?, "paid_count")?,
            total_products_sold: to_u64(row.try_get("products_sold")?, "products_sold")?,
            total_unique_customers: to_u64(row.try_get("customers")?, "customers")?,
            category_summary,
        })
    }

    async fn write_report(&mut self, report: &AggregateReport) -> Result<(), StoreError> {
        let totals = &report.totals;
        let revenue = to_i64(totals.total_revenue, "total_revenue")?;
        let paid = to_i64(totals.total_paid_transactions, "total_paid_transactions")?;
        let sold = to_i64(totals.total_products_sold, "total_products_sold")?;
        let customers = to_i64(totals.total_unique_customers, "total_unique_customers")?;

        let tx = self.locked()?;
        sqlx::query(
            r#"
            UPDATE transaction_reports
            SET total_revenue = $2,
                total_paid_transactions = $3,
                total_products_sold = $4,
                total_unique_customers = $5,
                category_summary = $6,
                updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(report.id)
        .bind(revenue)
        .bind(paid)
        .bind(sold)
        .bind(customers)
        .bind(Json(&totals.category_summary))
        .bind(report.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("write_report", e))?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        if let Some(tx) = self.tx.take() {
            tx.commit()
                .await
                .map_err(|e| map_sqlx_error("commit_report", e))?;
        }
        self.locked = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        if let Some(tx) = self.tx.take() {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback_report", e))?;
        }
        self.locked = false;
        Ok(())
    }
}

#[async_trait]
impl ReportStore for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn ReportUnitOfWork>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_report", e))?;
        Ok(Box::new(PostgresReportWork {
            tx: Some(tx),
            locked: false,
        }))
    }

    async fn load_report(&self) -> Result<AggregateReport, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, total_revenue, total_paid_transactions, total_products_sold,
                   total_unique_customers, category_summary, updated_at
            FROM transaction_reports
            WHERE id = $1
            "#,
        )
        .bind(REPORT_ID)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_report", e))?;

        match row {
            Some(row) => report_from_row(&row),
            None => Ok(AggregateReport::empty()),
        }
    }
}
