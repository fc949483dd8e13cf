//! Postgres-backed ledger store implementation.
//!
//! Movements live in an append-only `stock_movements` table; order documents
//! are JSONB rows carrying a `version` column. Registered variants live in
//! `variants`, unique per business by id and by SKU.
//!
//! ## Commit Scope
//!
//! `commit()` runs in one transaction:
//! 1. `pg_advisory_xact_lock` on every `(business, variant)` the change set
//!    touches, in sorted key order
//! 2. every touched variant must be registered
//! 3. conditional document write (`INSERT .. ON CONFLICT DO NOTHING` for
//!    `Exact(0)`, `UPDATE .. WHERE version = $v` for `Exact(v)`)
//! 4. opening balances and guard admission
//! 5. movement inserts
//!
//! The per-variant lock serialises concurrent deductions on a variant, so the
//! balance read in step 4 cannot go stale before step 5. Sorted acquisition
//! keeps multi-variant change sets from deadlocking each other.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (balance past `BIGINT`) | `22003` | `BalanceOutOfRange` |
//! | Database (other) | Any other | `Backend` |
//! | Other | N/A | `Backend` |

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use stockledger_core::{
    AggregateId, BusinessId, ExpectedVersion, Page, Pagination, VariantId, Versioned,
};
use stockledger_inventory::{
    MovementDraft, MovementId, MovementType, ReferenceType, StockKey, StockMovement, Variant,
    admit, guarded_keys,
};
use stockledger_purchasing::{PurchaseOrder, PurchaseOrderId, PurchaseOrderStatus};
use stockledger_sales::{SalesOrder, SalesOrderId, SalesOrderStatus};

use super::{ChangeSet, Committed, DocumentWrite, LedgerStore, StoreError, StoredDocument};

const MIGRATION: &str = include_str!("../../migrations/0001_stock_ledger.sql");

/// Connection pool settings for [`PostgresLedgerStore::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: std::time::Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: std::time::Duration::from_secs(5),
        }
    }
}

/// Postgres-backed ledger store.
///
/// Every query includes `business_id` in the WHERE clause, so a document or
/// movement of another business is never visible.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool against `url`.
    pub async fn connect(url: &str, settings: &PoolSettings) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the schema if it does not exist yet.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(MIGRATION)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        tracing::info!("stock ledger schema is up to date");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn apply(
        conn: &mut PgConnection,
        drafts: Vec<MovementDraft>,
        document: Option<DocumentWrite>,
    ) -> Result<Committed, StoreError> {
        let touched: BTreeSet<StockKey> = drafts
            .iter()
            .map(|d| (d.business_id(), d.variant_id()))
            .collect();
        for (business_id, variant_id) in &touched {
            sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
                .bind(format!("{business_id}:{variant_id}"))
                .execute(&mut *conn)
                .await
                .map_err(|e| map_sqlx_error("advisory_lock", e))?;
        }
        for (business_id, variant_id) in &touched {
            if !variant_exists(&mut *conn, *business_id, *variant_id).await? {
                return Err(StoreError::UnknownVariant(*variant_id));
            }
        }

        let document_version = match &document {
            Some(DocumentWrite::PurchaseOrder { document, expected }) => {
                Some(write_document(&mut *conn, document, *expected).await?)
            }
            Some(DocumentWrite::SalesOrder { document, expected }) => {
                Some(write_document(&mut *conn, document, *expected).await?)
            }
            None => None,
        };

        let mut opening = HashMap::new();
        for key in guarded_keys(&drafts) {
            let balance = balance_of(&mut *conn, key.0, key.1).await?;
            opening.insert(key, balance);
        }
        admit(&opening, &drafts)?;

        let created_at = Utc::now();
        let mut movements = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let id = MovementId::new(AggregateId::new());
            let row = sqlx::query(
                r#"
                INSERT INTO stock_movements (
                    id,
                    business_id,
                    variant_id,
                    movement_type,
                    quantity,
                    reference_type,
                    reference_id,
                    note,
                    created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING sequence_number
                "#,
            )
            .bind(id.0.as_uuid())
            .bind(draft.business_id().as_uuid())
            .bind(draft.variant_id().as_uuid())
            .bind(draft.movement_type().as_str())
            .bind(draft.quantity())
            .bind(draft.reference_type().as_str())
            .bind(draft.reference_id().map(|r| *r.as_uuid()))
            .bind(draft.note())
            .bind(created_at)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("insert_movement", e))?;

            let sequence: i64 = row
                .try_get("sequence_number")
                .map_err(|e| map_sqlx_error("insert_movement", e))?;
            movements.push(StockMovement::from_draft(draft, id, sequence as u64, created_at));
        }

        Ok(Committed {
            movements,
            document_version,
        })
    }
}

async fn balance_of(
    conn: &mut PgConnection,
    business_id: BusinessId,
    variant_id: VariantId,
) -> Result<i64, StoreError> {
    let row = sqlx::query(
        r#"
        SELECT COALESCE(
            SUM(CASE WHEN movement_type = 'OUT' THEN -quantity ELSE quantity END),
            0
        )::BIGINT AS balance
        FROM stock_movements
        WHERE business_id = $1 AND variant_id = $2
        "#,
    )
    .bind(business_id.as_uuid())
    .bind(variant_id.as_uuid())
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("22003") => {
            StoreError::BalanceOutOfRange(variant_id)
        }
        _ => map_sqlx_error("balance", e),
    })?;

    row.try_get("balance")
        .map_err(|e| map_sqlx_error("balance", e))
}

async fn variant_exists(
    conn: &mut PgConnection,
    business_id: BusinessId,
    variant_id: VariantId,
) -> Result<bool, StoreError> {
    let row = sqlx::query(
        "SELECT EXISTS (SELECT 1 FROM variants WHERE business_id = $1 AND id = $2) AS registered",
    )
    .bind(business_id.as_uuid())
    .bind(variant_id.as_uuid())
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("variant_exists", e))?;

    row.try_get("registered")
        .map_err(|e| map_sqlx_error("variant_exists", e))
}

fn variant_from_row(row: &PgRow) -> Result<Variant, StoreError> {
    let Json(variant): Json<Variant> = row
        .try_get("document")
        .map_err(|e| map_sqlx_error("decode_variant", e))?;
    Ok(variant)
}

async fn write_document<T: StoredDocument>(
    conn: &mut PgConnection,
    document: &T,
    expected: ExpectedVersion,
) -> Result<u64, StoreError> {
    let (created_at, updated_at) = document.timestamps();
    let table = T::TABLE;

    match expected {
        ExpectedVersion::Exact(0) => {
            let sql = format!(
                "INSERT INTO {table} (business_id, id, status, version, document, created_at, updated_at) \
                 VALUES ($1, $2, $3, 1, $4, $5, $6) \
                 ON CONFLICT (business_id, id) DO NOTHING"
            );
            let result = sqlx::query(&sql)
                .bind(document.business_id().as_uuid())
                .bind(T::key(document.id()))
                .bind(document.status_str())
                .bind(Json(document))
                .bind(created_at)
                .bind(updated_at)
                .execute(&mut *conn)
                .await
                .map_err(|e| map_sqlx_error("insert_document", e))?;
            if result.rows_affected() == 0 {
                return Err(StoreError::Conflict(format!(
                    "{table} row {} already exists",
                    document.id()
                )));
            }
            Ok(1)
        }
        ExpectedVersion::Exact(version) => {
            let sql = format!(
                "UPDATE {table} SET status = $3, version = version + 1, document = $4, updated_at = $5 \
                 WHERE business_id = $1 AND id = $2 AND version = $6"
            );
            let result = sqlx::query(&sql)
                .bind(document.business_id().as_uuid())
                .bind(T::key(document.id()))
                .bind(document.status_str())
                .bind(Json(document))
                .bind(updated_at)
                .bind(version as i64)
                .execute(&mut *conn)
                .await
                .map_err(|e| map_sqlx_error("update_document", e))?;
            if result.rows_affected() == 0 {
                return Err(StoreError::Conflict(format!(
                    "{table} row {} is no longer at version {version}",
                    document.id()
                )));
            }
            Ok(version + 1)
        }
        ExpectedVersion::Any => {
            let sql = format!(
                "INSERT INTO {table} (business_id, id, status, version, document, created_at, updated_at) \
                 VALUES ($1, $2, $3, 1, $4, $5, $6) \
                 ON CONFLICT (business_id, id) DO UPDATE SET \
                     status = EXCLUDED.status, \
                     version = {table}.version + 1, \
                     document = EXCLUDED.document, \
                     updated_at = EXCLUDED.updated_at \
                 RETURNING version"
            );
            let row = sqlx::query(&sql)
                .bind(document.business_id().as_uuid())
                .bind(T::key(document.id()))
                .bind(document.status_str())
                .bind(Json(document))
                .bind(created_at)
                .bind(updated_at)
                .fetch_one(&mut *conn)
                .await
                .map_err(|e| map_sqlx_error("upsert_document", e))?;
            let version: i64 = row
                .try_get("version")
                .map_err(|e| map_sqlx_error("upsert_document", e))?;
            Ok(version as u64)
        }
    }
}

fn versioned_from_row<T: StoredDocument>(row: &PgRow) -> Result<Versioned<T>, StoreError> {
    let version: i64 = row
        .try_get("version")
        .map_err(|e| map_sqlx_error("decode_document", e))?;
    let Json(document): Json<T> = row
        .try_get("document")
        .map_err(|e| map_sqlx_error("decode_document", e))?;
    Ok(Versioned::new(version as u64, document))
}

async fn load_document<T: StoredDocument>(
    pool: &PgPool,
    business_id: BusinessId,
    key: Uuid,
) -> Result<Option<Versioned<T>>, StoreError> {
    let sql = format!(
        "SELECT version, document FROM {} WHERE business_id = $1 AND id = $2",
        T::TABLE
    );
    let row = sqlx::query(&sql)
        .bind(business_id.as_uuid())
        .bind(key)
        .fetch_optional(pool)
        .await
        .map_err(|e| map_sqlx_error("load_document", e))?;

    row.as_ref().map(versioned_from_row::<T>).transpose()
}

async fn list_documents<T: StoredDocument>(
    pool: &PgPool,
    business_id: BusinessId,
    status: Option<&'static str>,
    pagination: Pagination,
) -> Result<Page<Versioned<T>>, StoreError> {
    let table = T::TABLE;

    let count_sql = format!(
        "SELECT COUNT(*) AS total FROM {table} \
         WHERE business_id = $1 AND ($2::TEXT IS NULL OR status = $2)"
    );
    let total: i64 = sqlx::query(&count_sql)
        .bind(business_id.as_uuid())
        .bind(status)
        .fetch_one(pool)
        .await
        .and_then(|row| row.try_get("total"))
        .map_err(|e| map_sqlx_error("count_documents", e))?;

    let page_sql = format!(
        "SELECT version, document FROM {table} \
         WHERE business_id = $1 AND ($2::TEXT IS NULL OR status = $2) \
         ORDER BY created_at DESC, id DESC \
         LIMIT $3 OFFSET $4"
    );
    let rows = sqlx::query(&page_sql)
        .bind(business_id.as_uuid())
        .bind(status)
        .bind(i64::from(pagination.limit))
        .bind(pagination.offset() as i64)
        .fetch_all(pool)
        .await
        .map_err(|e| map_sqlx_error("list_documents", e))?;

    let items = rows
        .iter()
        .map(versioned_from_row::<T>)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Page::new(items, total as u64, pagination))
}

fn movement_from_row(row: &PgRow) -> Result<StockMovement, StoreError> {
    let decode = |e: sqlx::Error| map_sqlx_error("decode_movement", e);

    let movement_type: String = row.try_get("movement_type").map_err(decode)?;
    let reference_type: String = row.try_get("reference_type").map_err(decode)?;
    let sequence: i64 = row.try_get("sequence_number").map_err(decode)?;
    let reference_id: Option<Uuid> = row.try_get("reference_id").map_err(decode)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(decode)?;

    Ok(StockMovement {
        id: MovementId::new(AggregateId::from_uuid(row.try_get("id").map_err(decode)?)),
        business_id: BusinessId::from_uuid(row.try_get("business_id").map_err(decode)?),
        variant_id: VariantId::from_uuid(row.try_get("variant_id").map_err(decode)?),
        movement_type: MovementType::parse(&movement_type)
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        quantity: row.try_get("quantity").map_err(decode)?,
        reference_type: ReferenceType::parse(&reference_type)
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        reference_id: reference_id.map(AggregateId::from_uuid),
        note: row.try_get("note").map_err(decode)?,
        sequence_number: sequence as u64,
        created_at,
    })
}

#[async_trait::async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(skip(self, variant), fields(business_id = %variant.business_id(), variant_id = %variant.id()), err)]
    async fn register_variant(&self, variant: Variant) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO variants (business_id, id, sku, document, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(variant.business_id().as_uuid())
        .bind(variant.id().as_uuid())
        .bind(variant.sku())
        .bind(Json(&variant))
        .bind(variant.created_at())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("register_variant", e))?;
        Ok(())
    }

    async fn variant(
        &self,
        business_id: BusinessId,
        variant_id: VariantId,
    ) -> Result<Option<Variant>, StoreError> {
        let row = sqlx::query("SELECT document FROM variants WHERE business_id = $1 AND id = $2")
            .bind(business_id.as_uuid())
            .bind(variant_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("variant", e))?;

        row.as_ref().map(variant_from_row).transpose()
    }

    #[instrument(skip(self), fields(business_id = %business_id, variant_id = %variant_id), err)]
    async fn movements(
        &self,
        business_id: BusinessId,
        variant_id: VariantId,
    ) -> Result<Vec<StockMovement>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                sequence_number,
                id,
                business_id,
                variant_id,
                movement_type,
                quantity,
                reference_type,
                reference_id,
                note,
                created_at
            FROM stock_movements
            WHERE business_id = $1 AND variant_id = $2
            ORDER BY sequence_number ASC
            "#,
        )
        .bind(business_id.as_uuid())
        .bind(variant_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("movements", e))?;

        rows.iter().map(movement_from_row).collect()
    }

    async fn balance(&self, business_id: BusinessId, variant_id: VariantId) -> Result<i64, StoreError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;
        balance_of(&mut *conn, business_id, variant_id).await
    }

    async fn purchase_order(
        &self,
        business_id: BusinessId,
        id: PurchaseOrderId,
    ) -> Result<Option<Versioned<PurchaseOrder>>, StoreError> {
        load_document(&self.pool, business_id, PurchaseOrder::key(id)).await
    }

    async fn purchase_orders(
        &self,
        business_id: BusinessId,
        status: Option<PurchaseOrderStatus>,
        pagination: Pagination,
    ) -> Result<Page<Versioned<PurchaseOrder>>, StoreError> {
        list_documents(&self.pool, business_id, status.map(|s| s.as_str()), pagination).await
    }

    async fn sales_order(
        &self,
        business_id: BusinessId,
        id: SalesOrderId,
    ) -> Result<Option<Versioned<SalesOrder>>, StoreError> {
        load_document(&self.pool, business_id, SalesOrder::key(id)).await
    }

    async fn sales_orders(
        &self,
        business_id: BusinessId,
        status: Option<SalesOrderStatus>,
        pagination: Pagination,
    ) -> Result<Page<Versioned<SalesOrder>>, StoreError> {
        list_documents(&self.pool, business_id, status.map(|s| s.as_str()), pagination).await
    }

    #[instrument(
        skip(self, changes),
        fields(
            business_id = %changes.business_id(),
            movement_count = changes.movements().len(),
            has_document = changes.document().is_some()
        ),
        err
    )]
    async fn commit(&self, changes: ChangeSet) -> Result<Committed, StoreError> {
        changes.ensure_single_business()?;
        let (_, drafts, document) = changes.into_parts();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        match Self::apply(&mut *tx, drafts, document).await {
            Ok(committed) => {
                tx.commit()
                    .await
                    .map_err(|e| map_sqlx_error("commit_transaction", e))?;
                Ok(committed)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                Err(err)
            }
        }
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}
