//! Postgres-backed inventory store.
//!
//! Stock transactions run at `READ COMMITTED` and take a row lock with
//! `SELECT ... FOR UPDATE`, so concurrent movements on one product queue behind
//! each other while other products proceed untouched. Ledger reads
//! (`find_movements`, `movement_report`) run their count, page and summary
//! queries inside one `REPEATABLE READ, READ ONLY` transaction so the total,
//! the page and the per-type totals agree.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database | `23505` | `UniqueViolation` | Duplicate sku, barcode or id |
//! | Database | `40001`, `40P01` | `Concurrency` | Serialization failure or deadlock; retried by the ledger |
//! | Database | `57014`, `55P03` | `Unavailable` | Statement timeout or lock not available |
//! | Database | Any other | `Backend` | Check constraint, foreign key, ... |
//! | RowNotFound | N/A | `NotFound` | `fetch_one` matched nothing |
//! | PoolTimedOut, PoolClosed, Io | N/A | `Unavailable` | Database unreachable |
//! | Other | N/A | `Backend` | Decode errors, protocol errors, ... |

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgConnection, PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, instrument};

use stockledger_core::{ActorId, MovementId, ProductId};
use stockledger_inventory::{Movement, MovementType, Product};

use super::filter::{
    MovementFilter, MovementPage, MovementReport, MovementSummary, Pagination, ProductFilter,
};
use super::r#trait::{InventoryStore, StockTransaction, StoreError};

/// Schema applied by [`PostgresInventoryStore::migrate`], one statement per entry.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id UUID PRIMARY KEY,
        sku VARCHAR(20) NOT NULL UNIQUE,
        name VARCHAR(100) NOT NULL,
        description VARCHAR(500),
        barcode VARCHAR(50) UNIQUE,
        unit VARCHAR(10) NOT NULL DEFAULT 'UN',
        current_stock BIGINT NOT NULL DEFAULT 0 CHECK (current_stock >= 0),
        min_stock BIGINT CHECK (min_stock >= 0),
        max_stock BIGINT CHECK (max_stock >= 0),
        price NUMERIC(12, 2) NOT NULL CHECK (price > 0),
        cost NUMERIC(12, 2) CHECK (cost > 0),
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS stock_movements (
        seq BIGSERIAL UNIQUE,
        id UUID PRIMARY KEY,
        product_id UUID NOT NULL REFERENCES products (id) ON DELETE RESTRICT,
        movement_type TEXT NOT NULL
            CHECK (movement_type IN ('IN', 'OUT', 'ADJUSTMENT', 'TRANSFER', 'LOSS', 'RETURN')),
        quantity BIGINT NOT NULL CHECK (quantity >= 0),
        previous_stock BIGINT NOT NULL CHECK (previous_stock >= 0),
        new_stock BIGINT NOT NULL CHECK (new_stock >= 0),
        reason VARCHAR(200),
        reference VARCHAR(50),
        unit_cost NUMERIC(12, 2),
        actor_id TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_stock_movements_product_created
        ON stock_movements (product_id, created_at DESC, seq DESC)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_stock_movements_created
        ON stock_movements (created_at DESC, seq DESC)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_products_active_stock
        ON products (is_active, current_stock)
    "#,
];

const PRODUCT_COLUMNS: &str = "id, sku, name, description, barcode, unit, current_stock, \
     min_stock, max_stock, price, cost, is_active, created_at, updated_at";

const MOVEMENT_COLUMNS: &str = "id, product_id, movement_type, quantity, previous_stock, \
     new_stock, reason, reference, unit_cost, actor_id, created_at";

/// Shared WHERE clause for movement listings; `$1..$5` are the filter fields.
const MOVEMENT_WHERE: &str = r#"
    WHERE ($1::uuid IS NULL OR product_id = $1)
        AND ($2::text IS NULL OR actor_id = $2)
        AND ($3::text IS NULL OR movement_type = $3)
        AND ($4::timestamptz IS NULL OR created_at >= $4)
        AND ($5::timestamptz IS NULL OR created_at <= $5)
"#;

/// Postgres-backed inventory store.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: Arc<PgPool>,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Open a pool using the `DATABASE_URL` environment variable.
    pub async fn connect_from_env() -> Result<Self, StoreError> {
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| StoreError::Backend("DATABASE_URL is not set".to_string()))?;
        Self::connect(&url).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("migrate", e))?;
        }
        debug!(statements = SCHEMA.len(), "inventory schema applied");
        Ok(())
    }

    /// Open a `REPEATABLE READ, READ ONLY` transaction for multi-query ledger reads.
    async fn snapshot(&self) -> Result<Transaction<'static, Postgres>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_isolation", e))?;
        Ok(tx)
    }
}

/// Unit of work over one pooled connection.
///
/// Dropping without commit rolls the database transaction back.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StockTransaction for PostgresTransaction {
    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn product_for_update(&mut self, id: ProductId) -> Result<Product, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("product_for_update", e))?
            .ok_or_else(|| StoreError::NotFound(format!("product {id}")))?;
        product_from_row(&row)
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn write_product_stock(
        &mut self,
        id: ProductId,
        new_stock: i64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET current_stock = $2, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(new_stock)
        .bind(at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("write_product_stock", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("product {id}")));
        }
        Ok(())
    }

    #[instrument(
        skip(self, movement),
        fields(product_id = %movement.product_id, movement_id = %movement.id),
        err
    )]
    async fn append_movement(&mut self, movement: &Movement) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id,
                product_id,
                movement_type,
                quantity,
                previous_stock,
                new_stock,
                reason,
                reference,
                unit_cost,
                actor_id,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(movement.id.as_uuid())
        .bind(movement.product_id.as_uuid())
        .bind(movement.movement_type.as_str())
        .bind(movement.quantity)
        .bind(movement.previous_stock)
        .bind(movement.new_stock)
        .bind(movement.reason.as_deref())
        .bind(movement.reference.as_deref())
        .bind(movement.unit_cost)
        .bind(movement.actor_id.as_str())
        .bind(movement.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("append_movement", e))?;
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(PostgresTransaction { tx })
    }

    #[instrument(skip(self, product, opening), fields(product_id = %product.id, sku = %product.sku), err)]
    async fn insert_product(
        &self,
        product: &Product,
        opening: Option<&Movement>,
    ) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, description, barcode, unit, current_stock,
                min_stock, max_stock, price, cost, is_active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.description.as_deref())
        .bind(product.barcode.as_deref())
        .bind(&product.unit)
        .bind(product.current_stock)
        .bind(product.min_stock)
        .bind(product.max_stock)
        .bind(product.price)
        .bind(product.cost)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *tx.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;

        if let Some(movement) = opening {
            tx.append_movement(movement).await?;
        }
        tx.commit().await
    }

    #[instrument(skip(self, product), fields(product_id = %product.id), err)]
    async fn update_product(&self, product: &Product) -> Result<Product, StoreError> {
        let sql = format!(
            r#"
            UPDATE products
            SET name = $2,
                description = $3,
                barcode = $4,
                unit = $5,
                min_stock = $6,
                max_stock = $7,
                price = $8,
                cost = $9,
                updated_at = $10
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(product.id.as_uuid())
            .bind(&product.name)
            .bind(product.description.as_deref())
            .bind(product.barcode.as_deref())
            .bind(&product.unit)
            .bind(product.min_stock)
            .bind(product.max_stock)
            .bind(product.price)
            .bind(product.cost)
            .bind(product.updated_at)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_product", e))?
            .ok_or_else(|| StoreError::NotFound(format!("product {}", product.id)))?;
        product_from_row(&row)
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn deactivate_product(&self, id: ProductId, at: DateTime<Utc>) -> Result<Product, StoreError> {
        let sql = format!(
            r#"
            UPDATE products
            SET updated_at = CASE WHEN is_active THEN $2 ELSE updated_at END,
                is_active = FALSE
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(at)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("deactivate_product", e))?
            .ok_or_else(|| StoreError::NotFound(format!("product {id}")))?;
        product_from_row(&row)
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_by_id", e))?;
        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn find_by_sku(&self, sku: &str) -> Result<Option<Product>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = $1");
        let row = sqlx::query(&sql)
            .bind(sku)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_by_sku", e))?;
        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn find_by_barcode(&self, barcode: &str) -> Result<Option<Product>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE barcode = $1");
        let row = sqlx::query(&sql)
            .bind(barcode)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_by_barcode", e))?;
        row.as_ref().map(product_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn find_all(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        // Sort column and direction come from closed enums, never from caller text.
        let sql = format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE ($1::boolean IS NULL OR is_active = $1)
                AND ($2::text IS NULL
                    OR name ILIKE $2 ESCAPE '\'
                    OR sku ILIKE $2 ESCAPE '\'
                    OR barcode ILIKE $2 ESCAPE '\')
            ORDER BY {column} {order}, id ASC
            LIMIT $3 OFFSET $4
            "#,
            column = filter.sort.column(),
            order = filter.order.keyword(),
        );

        let pattern = filter.search_term().map(like_pattern);
        let (limit, offset) = match filter.pagination {
            Some(page) => (Some(i64::from(page.limit)), i64::from(page.offset)),
            None => (None, 0),
        };

        let rows = sqlx::query(&sql)
            .bind(filter.is_active)
            .bind(pattern)
            .bind(limit)
            .bind(offset)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_all", e))?;

        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn exists_active(&self, id: ProductId) -> Result<bool, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (SELECT 1 FROM products WHERE id = $1 AND is_active) AS found
            "#,
        )
        .bind(id.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("exists_active", e))?;
        decode(&row, "found")
    }

    #[instrument(skip(self), fields(limit = pagination.limit, offset = pagination.offset), err)]
    async fn find_movements(
        &self,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> Result<MovementPage, StoreError> {
        let mut tx = self.snapshot().await?;
        let page = movement_page(&mut tx, filter, pagination).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(page)
    }

    #[instrument(skip(self), err)]
    async fn summarize_movements(
        &self,
        filter: &MovementFilter,
    ) -> Result<BTreeMap<MovementType, MovementSummary>, StoreError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;
        movement_summary(&mut conn, filter).await
    }

    #[instrument(skip(self), fields(limit = pagination.limit, offset = pagination.offset), err)]
    async fn movement_report(
        &self,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> Result<MovementReport, StoreError> {
        let mut tx = self.snapshot().await?;
        let page = movement_page(&mut tx, filter, pagination).await?;
        let summary = movement_summary(&mut tx, filter).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(MovementReport { page, summary })
    }
}

/// Count and page query for a movement listing, on the caller's connection.
async fn movement_page(
    conn: &mut PgConnection,
    filter: &MovementFilter,
    pagination: Pagination,
) -> Result<MovementPage, StoreError> {
    let count_sql = format!("SELECT COUNT(*) AS total FROM stock_movements {MOVEMENT_WHERE}");
    let count_row = bind_movement_filter(sqlx::query(&count_sql), filter)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("count_movements", e))?;
    let total: i64 = decode(&count_row, "total")?;

    let list_sql = format!(
        "SELECT {MOVEMENT_COLUMNS} FROM stock_movements {MOVEMENT_WHERE} \
         ORDER BY created_at DESC, seq DESC LIMIT $6 OFFSET $7"
    );
    let rows = bind_movement_filter(sqlx::query(&list_sql), filter)
        .bind(i64::from(pagination.limit))
        .bind(i64::from(pagination.offset))
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("find_movements", e))?;

    let movements = rows.iter().map(movement_from_row).collect::<Result<Vec<_>, _>>()?;
    Ok(MovementPage {
        movements,
        total: u64::try_from(total).unwrap_or_default(),
    })
}

async fn movement_summary(
    conn: &mut PgConnection,
    filter: &MovementFilter,
) -> Result<BTreeMap<MovementType, MovementSummary>, StoreError> {
    let sql = format!(
        "SELECT movement_type, SUM(quantity)::BIGINT AS total_quantity, COUNT(*) AS total_movements \
         FROM stock_movements {MOVEMENT_WHERE} GROUP BY movement_type"
    );
    let rows = bind_movement_filter(sqlx::query(&sql), filter)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("summarize_movements", e))?;

    let mut summary = BTreeMap::new();
    for row in rows {
        let movement_type = parse_movement_type(&decode::<String>(&row, "movement_type")?)?;
        let total_quantity: i64 = decode(&row, "total_quantity")?;
        let total_movements: i64 = decode(&row, "total_movements")?;
        summary.insert(
            movement_type,
            MovementSummary {
                total_quantity,
                total_movements: u64::try_from(total_movements).unwrap_or_default(),
            },
        );
    }
    Ok(summary)
}

fn bind_movement_filter<'q>(
    query: sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>,
    filter: &MovementFilter,
) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
    query
        .bind(filter.product_id.map(|id| *id.as_uuid()))
        .bind(filter.actor_id.as_ref().map(|a| a.as_str().to_string()))
        .bind(filter.movement_type.map(MovementType::as_str))
        .bind(filter.created_after)
        .bind(filter.created_before)
}

/// Turn a search term into an `ILIKE` substring pattern with wildcards escaped.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn decode<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Backend(format!("failed to read {column}: {e}")))
}

fn parse_movement_type(value: &str) -> Result<MovementType, StoreError> {
    value
        .parse()
        .map_err(|_| StoreError::Backend(format!("unknown movement type in ledger: {value}")))
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    Ok(Product {
        id: ProductId::from_uuid(decode(row, "id")?),
        sku: decode(row, "sku")?,
        name: decode(row, "name")?,
        description: decode(row, "description")?,
        barcode: decode(row, "barcode")?,
        unit: decode(row, "unit")?,
        current_stock: decode(row, "current_stock")?,
        min_stock: decode(row, "min_stock")?,
        max_stock: decode(row, "max_stock")?,
        price: decode::<Decimal>(row, "price")?,
        cost: decode::<Option<Decimal>>(row, "cost")?,
        is_active: decode(row, "is_active")?,
        created_at: decode(row, "created_at")?,
        updated_at: decode(row, "updated_at")?,
    })
}

fn movement_from_row(row: &PgRow) -> Result<Movement, StoreError> {
    Ok(Movement {
        id: MovementId::from_uuid(decode(row, "id")?),
        product_id: ProductId::from_uuid(decode(row, "product_id")?),
        movement_type: parse_movement_type(&decode::<String>(row, "movement_type")?)?,
        quantity: decode(row, "quantity")?,
        previous_stock: decode(row, "previous_stock")?,
        new_stock: decode(row, "new_stock")?,
        reason: decode(row, "reason")?,
        reference: decode(row, "reference")?,
        unit_cost: decode::<Option<Decimal>>(row, "unit_cost")?,
        actor_id: ActorId::new(decode::<String>(row, "actor_id")?),
        created_at: decode(row, "created_at")?,
    })
}

/// Classify a Postgres SQLSTATE.
fn classify_code(code: &str, msg: String) -> StoreError {
    match code {
        "23505" => StoreError::UniqueViolation(msg),
        // serialization_failure, deadlock_detected
        "40001" | "40P01" => StoreError::Concurrency(msg),
        // query_canceled (statement timeout), lock_not_available
        "57014" | "55P03" => StoreError::Unavailable(msg),
        _ => StoreError::Backend(msg),
    }
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code() {
                Some(code) => classify_code(code.as_ref(), msg),
                None => StoreError::Backend(msg),
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound(format!("no row in {operation}")),
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(format!("database unavailable in {operation}: {err}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlstate_codes_map_to_store_errors() {
        let msg = || "boom".to_string();
        assert!(matches!(classify_code("23505", msg()), StoreError::UniqueViolation(_)));
        assert!(matches!(classify_code("40001", msg()), StoreError::Concurrency(_)));
        assert!(matches!(classify_code("40P01", msg()), StoreError::Concurrency(_)));
        assert!(matches!(classify_code("57014", msg()), StoreError::Unavailable(_)));
        assert!(matches!(classify_code("55P03", msg()), StoreError::Unavailable(_)));
        assert!(matches!(classify_code("23514", msg()), StoreError::Backend(_)));
    }

    #[test]
    fn pool_and_io_failures_are_unavailable() {
        assert!(matches!(
            map_sqlx_error("op", sqlx::Error::PoolTimedOut),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            map_sqlx_error("op", sqlx::Error::PoolClosed),
            StoreError::Unavailable(_)
        ));
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(matches!(map_sqlx_error("op", sqlx::Error::Io(io)), StoreError::Unavailable(_)));
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        assert!(matches!(
            map_sqlx_error("op", sqlx::Error::RowNotFound),
            StoreError::NotFound(_)
        ));
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("mouse"), "%mouse%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn money_columns_hold_two_decimal_places() {
        use stockledger_inventory::{MONEY_LIMIT, MONEY_SCALE};

        assert_eq!(MONEY_SCALE, 2);
        // NUMERIC(12, 2) leaves ten integer digits.
        assert_eq!(MONEY_LIMIT, 10_i64.pow(12 - MONEY_SCALE));
        assert!(SCHEMA[0].contains("price NUMERIC(12, 2)"));
        assert!(SCHEMA[0].contains("cost NUMERIC(12, 2)"));
        assert!(SCHEMA[1].contains("unit_cost NUMERIC(12, 2)"));
    }

    #[test]
    fn schema_keeps_stock_non_negative_and_movements_restricted() {
        let products = SCHEMA[0];
        assert!(products.contains("CHECK (current_stock >= 0)"));
        assert!(products.contains("sku VARCHAR(20) NOT NULL UNIQUE"));
        let movements = SCHEMA[1];
        assert!(movements.contains("ON DELETE RESTRICT"));
    }
}
